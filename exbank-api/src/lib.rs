//! # EXBANK Curriculum Service
//!
//! Manages the six-level curriculum hierarchy
//! (Grade → Textbook → Unit → Lesson → {Format, ExerciseType} → Exercise):
//! - Bulk exercise import with on-demand hierarchy creation
//! - Administrative node merging with dependent rewrites
//! - Sorted tree projection of the active hierarchy
//! - Exercise listing/search and embedding backfill

pub mod api;
pub mod config;
pub mod curriculum;
pub mod embedding;

pub use exbank_common::{Error, Result};
