//! Database access
//!
//! Schema initialization and row models for the curriculum hierarchy.

pub mod init;
pub mod models;

pub use init::init_database;
