//! Node merge coordinator
//!
//! Consolidates two active nodes of the same hierarchy level: every active
//! dependent row is re-pointed from the source to the destination, then the
//! source is soft-deleted. One transaction covers the whole cascade; the
//! preconditions run inside it before any write.
//!
//! Each mergeable level maps to a list of dependent-relation rewrite rules,
//! so adding a level means adding a table entry, not another branch.

use exbank_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

/// Hierarchy levels that support merging. Textbooks do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeTable {
    Grade,
    Unit,
    Lesson,
    Format,
    ExerciseType,
}

/// One dependent-relation rewrite applied during a merge.
struct RewriteRule {
    table: &'static str,
    fk_column: &'static str,
    slot: CountSlot,
}

/// Which report field receives the affected-row count of a rewrite.
#[derive(Clone, Copy)]
enum CountSlot {
    Textbooks,
    Lessons,
    Exercises,
    ExerciseTypes,
}

impl MergeTable {
    fn node_table(self) -> &'static str {
        match self {
            MergeTable::Grade => "grades",
            MergeTable::Unit => "units",
            MergeTable::Lesson => "lessons",
            MergeTable::Format => "formats",
            MergeTable::ExerciseType => "exercise_types",
        }
    }

    fn node_label(self) -> &'static str {
        match self {
            MergeTable::Grade => "Grade",
            MergeTable::Unit => "Unit",
            MergeTable::Lesson => "Lesson",
            MergeTable::Format => "Format",
            MergeTable::ExerciseType => "ExerciseType",
        }
    }

    fn rewrites(self) -> &'static [RewriteRule] {
        match self {
            MergeTable::Grade => &[RewriteRule {
                table: "textbooks",
                fk_column: "grade_id",
                slot: CountSlot::Textbooks,
            }],
            MergeTable::Unit => &[RewriteRule {
                table: "lessons",
                fk_column: "unit_id",
                slot: CountSlot::Lessons,
            }],
            MergeTable::Lesson => &[
                RewriteRule {
                    table: "exercises",
                    fk_column: "lesson_id",
                    slot: CountSlot::Exercises,
                },
                RewriteRule {
                    table: "exercise_types",
                    fk_column: "lesson_id",
                    slot: CountSlot::ExerciseTypes,
                },
            ],
            MergeTable::Format => &[RewriteRule {
                table: "exercises",
                fk_column: "format_id",
                slot: CountSlot::Exercises,
            }],
            MergeTable::ExerciseType => &[RewriteRule {
                table: "exercises",
                fk_column: "type_id",
                slot: CountSlot::Exercises,
            }],
        }
    }
}

/// Per-table affected-row counts; only the slots a merge touches serialize.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCounts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textbooks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lessons: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercises: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercise_types: Option<u64>,
}

impl MergeCounts {
    fn record(&mut self, slot: CountSlot, affected: u64) {
        match slot {
            CountSlot::Textbooks => self.textbooks = Some(affected),
            CountSlot::Lessons => self.lessons = Some(affected),
            CountSlot::Exercises => self.exercises = Some(affected),
            CountSlot::ExerciseTypes => self.exercise_types = Some(affected),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub table: MergeTable,
    pub source_id: String,
    pub destination_id: String,
    pub updated_counts: MergeCounts,
    pub deleted: bool,
}

/// Merge `source_id` into `destination_id` within `table`.
///
/// Fails with `InvalidInput` when the ids coincide and with `NotFound` when
/// either side is not an active node of the declared table. A source that
/// was already merged away is inactive, so a repeat merge fails not-found.
pub async fn merge(
    pool: &SqlitePool,
    table: MergeTable,
    source_id: &str,
    destination_id: &str,
    actor: &str,
) -> Result<MergeReport> {
    if source_id == destination_id {
        return Err(Error::InvalidInput(
            "sourceId and destinationId must be different".into(),
        ));
    }

    let mut tx = pool.begin().await?;

    ensure_active(&mut tx, table, source_id).await?;
    ensure_active(&mut tx, table, destination_id).await?;

    let now = chrono::Utc::now();
    let mut counts = MergeCounts::default();

    for rule in table.rewrites() {
        let sql = format!(
            "UPDATE {} SET {} = ?, updated_by = ?, updated_at = ? \
             WHERE {} = ? AND deleted_at IS NULL",
            rule.table, rule.fk_column, rule.fk_column
        );
        let affected = sqlx::query(&sql)
            .bind(destination_id)
            .bind(actor)
            .bind(now)
            .bind(source_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        counts.record(rule.slot, affected);
    }

    // Retire the source; its row stays for history and old foreign keys
    let soft_delete = format!(
        "UPDATE {} SET updated_by = ?, updated_at = ?, deleted_at = ? WHERE guid = ?",
        table.node_table()
    );
    sqlx::query(&soft_delete)
        .bind(actor)
        .bind(now)
        .bind(now)
        .bind(source_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        "Merged {} {} into {}",
        table.node_label(),
        source_id,
        destination_id
    );

    Ok(MergeReport {
        table,
        source_id: source_id.to_string(),
        destination_id: destination_id.to_string(),
        updated_counts: counts,
        deleted: true,
    })
}

async fn ensure_active(
    tx: &mut Transaction<'_, Sqlite>,
    table: MergeTable,
    guid: &str,
) -> Result<()> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE guid = ? AND deleted_at IS NULL",
        table.node_table()
    );
    let found: Option<i64> = sqlx::query_scalar(&sql)
        .bind(guid)
        .fetch_optional(&mut **tx)
        .await?;
    if found.is_none() {
        return Err(Error::NotFound(format!(
            "{} not found: {}",
            table.node_label(),
            guid
        )));
    }
    Ok(())
}
