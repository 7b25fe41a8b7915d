//! Shared test utilities
//!
//! Every test gets its own SQLite database in a temp directory; the TempDir
//! must be kept alive for the duration of the test.

use exbank_api::curriculum::import::ExerciseImportRow;
use sqlx::SqlitePool;
use tempfile::TempDir;

#[allow(dead_code)]
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("create temp dir");
    let db_path = temp_dir.path().join("test_exbank.db");
    let pool = exbank_common::db::init_database(&db_path)
        .await
        .expect("init database");
    (temp_dir, pool)
}

#[allow(dead_code)]
pub fn import_row(
    grade: &str,
    textbook: &str,
    unit: &str,
    lesson: &str,
    format: &str,
    question: &str,
    key: &str,
) -> ExerciseImportRow {
    ExerciseImportRow {
        grade: grade.into(),
        textbook: textbook.into(),
        unit: unit.into(),
        lesson: lesson.into(),
        format: format.into(),
        exercise_type: None,
        question: question.into(),
        solution: "solution".into(),
        key: key.into(),
        has_image: false,
    }
}

#[allow(dead_code)]
pub fn import_row_with_type(
    grade: &str,
    textbook: &str,
    unit: &str,
    lesson: &str,
    format: &str,
    type_name: &str,
    question: &str,
    key: &str,
) -> ExerciseImportRow {
    ExerciseImportRow {
        exercise_type: Some(type_name.into()),
        ..import_row(grade, textbook, unit, lesson, format, question, key)
    }
}

/// Count every row of `table`, active or not
#[allow(dead_code)]
pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count rows")
}

/// Count active rows of `table`
#[allow(dead_code)]
pub async fn count_active(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {table} WHERE deleted_at IS NULL"
    ))
    .fetch_one(pool)
    .await
    .expect("count active rows")
}

/// Guid of the active node named `name` in `table`
#[allow(dead_code)]
pub async fn guid_of(pool: &SqlitePool, table: &str, name: &str) -> String {
    sqlx::query_scalar(&format!(
        "SELECT guid FROM {table} WHERE name = ? AND deleted_at IS NULL"
    ))
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap_or_else(|e| panic!("guid of {name} in {table}: {e}"))
}
