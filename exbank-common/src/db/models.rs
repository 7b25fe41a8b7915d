//! Database models
//!
//! Row shapes for the curriculum hierarchy. Identifiers are UUIDv4 strings
//! stored as TEXT; a row is active while `deleted_at` is NULL, so queries
//! filter on it and these structs never carry it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Grade {
    pub guid: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Textbook {
    pub guid: String,
    pub name: String,
    pub grade_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Unit {
    pub guid: String,
    pub name: String,
    pub textbook_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lesson {
    pub guid: String,
    pub name: String,
    pub unit_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExerciseType {
    pub guid: String,
    pub name: String,
    pub lesson_id: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Exercise {
    pub guid: String,
    pub lesson_id: String,
    pub format_id: String,
    pub type_id: Option<String>,
    pub question: String,
    pub solution: String,
    pub answer_key: String,
    pub has_image: bool,
    /// JSON-encoded vector, present once the embedding backfill has run
    pub question_embedding: Option<String>,
}
