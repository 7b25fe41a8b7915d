//! Bulk exercise import
//!
//! Ingests externally-sourced exercise rows, creating missing hierarchy
//! nodes on demand. The whole batch runs inside one transaction: either
//! every row's effects commit, or none do. Duplicate exercises are normal
//! outcomes recorded in the report, not errors.

use crate::curriculum::resolver::ResolverRun;
use exbank_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

/// One row of an import request. `type` is optional; `hasImage` defaults to
/// false when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseImportRow {
    pub grade: String,
    pub textbook: String,
    pub unit: String,
    pub lesson: String,
    pub format: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub exercise_type: Option<String>,
    pub question: String,
    pub solution: String,
    pub key: String,
    #[serde(default)]
    pub has_image: bool,
}

/// Outcome of one import call. Rows skipped as duplicates are echoed back
/// verbatim; the new-name lists carry the distinct names whose resolution
/// created a node during this run.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub inserted: u64,
    pub duplicate_exercise: Vec<ExerciseImportRow>,
    pub new_grades: Vec<String>,
    pub new_units: Vec<String>,
    pub new_lessons: Vec<String>,
    pub new_formats: Vec<String>,
    pub new_types: Vec<String>,
}

/// Import a batch of exercises in one all-or-nothing transaction.
///
/// Rows are processed sequentially in input order; a later row may reference
/// a hierarchy node created by an earlier one. An empty batch returns an
/// empty report without opening a transaction.
pub async fn import_exercises(
    pool: &SqlitePool,
    items: Vec<ExerciseImportRow>,
    actor: &str,
) -> Result<ImportReport> {
    if items.is_empty() {
        return Ok(ImportReport::default());
    }

    let mut tx = pool.begin().await?;
    let mut run = ResolverRun::new(actor);
    let mut report = ImportReport::default();

    for item in items {
        let grade_id = run.grade(&mut tx, &item.grade).await?;
        let textbook_id = run.textbook(&mut tx, &grade_id, &item.textbook).await?;
        let unit_id = run.unit(&mut tx, &textbook_id, &item.unit).await?;
        let lesson_id = run.lesson(&mut tx, &unit_id, &item.lesson).await?;
        let format_id = run.format(&mut tx, &item.format).await?;
        let type_id = match item.exercise_type.as_deref() {
            Some(name) => Some(run.exercise_type(&mut tx, &lesson_id, name).await?),
            None => None,
        };

        let duplicate: Option<String> = sqlx::query_scalar(
            "SELECT guid FROM exercises \
             WHERE lesson_id = ? AND deleted_at IS NULL \
               AND LOWER(question) = LOWER(?) AND LOWER(answer_key) = LOWER(?)",
        )
        .bind(&lesson_id)
        .bind(&item.question)
        .bind(&item.key)
        .fetch_optional(&mut *tx)
        .await?;

        if duplicate.is_some() {
            report.duplicate_exercise.push(item);
            continue;
        }

        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO exercises \
             (guid, lesson_id, format_id, type_id, question, solution, answer_key, has_image, \
              created_at, created_by, updated_at, updated_by) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&lesson_id)
        .bind(&format_id)
        .bind(&type_id)
        .bind(&item.question)
        .bind(&item.solution)
        .bind(&item.key)
        .bind(item.has_image)
        .bind(now)
        .bind(actor)
        .bind(now)
        .bind(actor)
        .execute(&mut *tx)
        .await?;
        report.inserted += 1;
    }

    tx.commit().await?;

    report.new_grades = run.new_grades;
    report.new_units = run.new_units;
    report.new_lessons = run.new_lessons;
    report.new_formats = run.new_formats;
    report.new_types = run.new_types;

    info!(
        "Imported {} exercises ({} duplicates skipped)",
        report.inserted,
        report.duplicate_exercise.len()
    );

    Ok(report)
}
