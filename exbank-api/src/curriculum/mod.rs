//! Hierarchy reconciliation and merge engine
//!
//! - `resolver`: resolve-or-create of hierarchy nodes by (scope, name)
//! - `import`: bulk exercise ingestion in one transaction
//! - `merge`: consolidation of two same-kind nodes with dependent rewrites
//! - `tree`: sorted projection of the active hierarchy
//! - `exercises`: paginated listing and search
//! - `backfill`: embedding backfill over exercises lacking a vector

pub mod backfill;
pub mod exercises;
pub mod import;
pub mod merge;
pub mod resolver;
pub mod tree;
