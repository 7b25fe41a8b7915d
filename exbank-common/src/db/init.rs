//! Database initialization
//!
//! Creates the SQLite database on first run and brings the curriculum schema
//! up idempotently. Safe to call on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL mode: concurrent readers with one writer, needed because imports
    // hold a write transaction across the whole batch
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    // Migrations (idempotent - safe to call multiple times)
    create_grades_table(&pool).await?;
    create_formats_table(&pool).await?;
    create_textbooks_table(&pool).await?;
    create_units_table(&pool).await?;
    create_lessons_table(&pool).await?;
    create_exercise_types_table(&pool).await?;
    create_exercises_table(&pool).await?;

    Ok(pool)
}

/// Create the grades table
///
/// Top of the curriculum hierarchy. Grade names are unique case-insensitively
/// among active rows; the partial unique index lets a concurrent creator lose
/// the race cleanly instead of inserting a duplicate.
pub async fn create_grades_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS grades (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            deleted_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            created_by TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_grades_name_active \
         ON grades(LOWER(TRIM(name))) WHERE deleted_at IS NULL",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the formats table
///
/// Globally scoped like grades (no parent).
pub async fn create_formats_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS formats (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            deleted_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            created_by TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_formats_name_active \
         ON formats(LOWER(TRIM(name))) WHERE deleted_at IS NULL",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the textbooks table
///
/// Scoped within a grade: name uniqueness is per grade_id.
pub async fn create_textbooks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS textbooks (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            grade_id TEXT NOT NULL REFERENCES grades(guid),
            deleted_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            created_by TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_textbooks_grade_id ON textbooks(grade_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_textbooks_scope_name_active \
         ON textbooks(grade_id, LOWER(TRIM(name))) WHERE deleted_at IS NULL",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the units table
pub async fn create_units_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS units (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            textbook_id TEXT NOT NULL REFERENCES textbooks(guid),
            deleted_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            created_by TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_units_textbook_id ON units(textbook_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_units_scope_name_active \
         ON units(textbook_id, LOWER(TRIM(name))) WHERE deleted_at IS NULL",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the lessons table
pub async fn create_lessons_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lessons (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            unit_id TEXT NOT NULL REFERENCES units(guid),
            deleted_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            created_by TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_lessons_unit_id ON lessons(unit_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_lessons_scope_name_active \
         ON lessons(unit_id, LOWER(TRIM(name))) WHERE deleted_at IS NULL",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the exercise_types table
///
/// Scoped within a lesson; carries an optional free-text description.
pub async fn create_exercise_types_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS exercise_types (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            lesson_id TEXT NOT NULL REFERENCES lessons(guid),
            deleted_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            created_by TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_exercise_types_lesson_id ON exercise_types(lesson_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_exercise_types_scope_name_active \
         ON exercise_types(lesson_id, LOWER(TRIM(name))) WHERE deleted_at IS NULL",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the exercises table
///
/// The fact table. `question_embedding` holds a JSON-encoded vector and is
/// written only by the embedding backfill, never by the import path.
pub async fn create_exercises_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS exercises (
            guid TEXT PRIMARY KEY,
            lesson_id TEXT NOT NULL REFERENCES lessons(guid),
            format_id TEXT NOT NULL REFERENCES formats(guid),
            type_id TEXT REFERENCES exercise_types(guid),
            question TEXT NOT NULL,
            solution TEXT NOT NULL,
            answer_key TEXT NOT NULL,
            has_image INTEGER NOT NULL DEFAULT 0,
            question_embedding TEXT,
            deleted_at TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            created_by TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_by TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_exercises_lesson_id ON exercises(lesson_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_exercises_format_id ON exercises(format_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_exercises_type_id ON exercises(type_id)")
        .execute(pool)
        .await?;
    // Speeds up the per-lesson duplicate check during bulk import
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_exercises_lesson_dedup \
         ON exercises(lesson_id, LOWER(question), LOWER(answer_key)) WHERE deleted_at IS NULL",
    )
    .execute(pool)
    .await?;

    Ok(())
}
