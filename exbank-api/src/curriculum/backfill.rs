//! Embedding backfill
//!
//! Walks active exercises whose question lacks a stored vector and fills it
//! in via the embedding oracle. Runs batch by batch without a transaction:
//! each vector is persisted as soon as it arrives, and an oracle miss is a
//! skip, not a failure. The import and merge paths never touch
//! `question_embedding`; this is its only writer.

use crate::embedding::EmbeddingClient;
use exbank_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillOptions {
    /// Rows fetched per batch; defaults to 50
    pub batch_size: Option<u32>,
    /// Stop after this many rows have been considered
    pub limit: Option<u32>,
    /// Leave rows that already carry a vector alone; defaults to true
    pub skip_existing: Option<bool>,
    /// Count what would change without writing; defaults to false
    pub dry_run: Option<bool>,
}

#[derive(Debug, Default, Serialize)]
pub struct BackfillResult {
    pub updated: u64,
    pub skipped: u64,
    pub batches: u64,
}

pub async fn backfill_embeddings(
    pool: &SqlitePool,
    embedding: &EmbeddingClient,
    options: BackfillOptions,
) -> Result<BackfillResult> {
    let batch_size = options.batch_size.filter(|b| *b > 0).unwrap_or(50);
    let limit = options.limit.filter(|l| *l > 0);
    let skip_existing = options.skip_existing.unwrap_or(true);
    let dry_run = options.dry_run.unwrap_or(false);

    let mut sql = String::from(
        "SELECT guid, question, question_embedding FROM exercises \
         WHERE deleted_at IS NULL AND TRIM(question) <> ''",
    );
    if skip_existing {
        sql.push_str(" AND question_embedding IS NULL");
    }
    sql.push_str(" ORDER BY created_at ASC LIMIT ? OFFSET ?");

    let mut offset: u32 = 0;
    let mut result = BackfillResult::default();

    loop {
        let considered = result.updated + result.skipped;
        let remaining = limit.map(|l| u64::from(l).saturating_sub(considered));
        if remaining == Some(0) {
            break;
        }
        let take = remaining.map_or(u64::from(batch_size), |r| r.min(u64::from(batch_size)));

        let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(&sql)
            .bind(take as i64)
            .bind(i64::from(offset))
            .fetch_all(pool)
            .await?;
        if rows.is_empty() {
            break;
        }
        result.batches += 1;

        // Rows updated under skip_existing leave the query's window, so the
        // offset advances only past rows that still match it
        let mut still_matching: u32 = 0;
        for (guid, question, existing) in &rows {
            if skip_existing && existing.is_some() {
                result.skipped += 1;
                still_matching += 1;
                continue;
            }

            // Oracle call happens with no transaction open
            let Some(embedded) = embedding.embed(question).await else {
                result.skipped += 1;
                still_matching += 1;
                continue;
            };

            if dry_run {
                still_matching += 1;
            } else {
                let vector = serde_json::to_string(&embedded.embedding)
                    .map_err(|e| Error::Internal(format!("encoding embedding: {e}")))?;
                sqlx::query("UPDATE exercises SET question_embedding = ? WHERE guid = ?")
                    .bind(vector)
                    .bind(guid)
                    .execute(pool)
                    .await?;
                if !skip_existing {
                    still_matching += 1;
                }
            }
            result.updated += 1;
        }

        offset += still_matching;
    }

    info!(
        "Backfill finished: updated={}, skipped={}, batches={}, dry_run={}",
        result.updated, result.skipped, result.batches, dry_run
    );

    Ok(result)
}
