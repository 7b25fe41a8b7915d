//! # EXBANK Common Library
//!
//! Shared code for the EXBANK curriculum service:
//! - Database initialization and schema
//! - Row models for hierarchy nodes and exercises
//! - Error types

pub mod db;
pub mod error;

pub use error::{Error, Result};
