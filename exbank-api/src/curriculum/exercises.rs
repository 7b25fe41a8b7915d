//! Exercise listing and search
//!
//! Paginated listing over active exercises with their hierarchy names. With
//! a free-text search, the embedding oracle is consulted first (outside any
//! transaction); if it yields a vector, results are ranked by L2 distance
//! over the stored question embeddings, otherwise the search falls back to
//! case-insensitive substring matching on the question.

use crate::embedding::EmbeddingClient;
use exbank_common::db::models::Exercise;
use exbank_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExercisesQuery {
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseHit {
    pub id: String,
    pub question: String,
    pub solution: String,
    pub key: String,
    pub has_image: bool,
    pub grade: Option<String>,
    pub textbook: Option<String>,
    pub unit: Option<String>,
    pub lesson: Option<String>,
    pub format: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub exercise_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
    pub total_records: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct ExercisePage {
    pub data: Vec<ExerciseHit>,
    pub pagination: Pagination,
}

const HIT_COLUMNS: &str = "e.guid, e.lesson_id, e.format_id, e.type_id, e.question, e.solution, \
     e.answer_key, e.has_image, e.question_embedding, \
     g.name AS grade_name, tb.name AS textbook_name, u.name AS unit_name, \
     l.name AS lesson_name, f.name AS format_name, t.name AS type_name";

const HIT_JOINS: &str = "FROM exercises e \
     LEFT JOIN lessons l ON l.guid = e.lesson_id \
     LEFT JOIN units u ON u.guid = l.unit_id \
     LEFT JOIN textbooks tb ON tb.guid = u.textbook_id \
     LEFT JOIN grades g ON g.guid = tb.grade_id \
     LEFT JOIN formats f ON f.guid = e.format_id \
     LEFT JOIN exercise_types t ON t.guid = e.type_id";

#[derive(sqlx::FromRow)]
struct HitRow {
    #[sqlx(flatten)]
    exercise: Exercise,
    grade_name: Option<String>,
    textbook_name: Option<String>,
    unit_name: Option<String>,
    lesson_name: Option<String>,
    format_name: Option<String>,
    type_name: Option<String>,
}

impl HitRow {
    fn into_hit(self, distance: Option<f64>) -> ExerciseHit {
        ExerciseHit {
            id: self.exercise.guid,
            question: self.exercise.question,
            solution: self.exercise.solution,
            key: self.exercise.answer_key,
            has_image: self.exercise.has_image,
            grade: self.grade_name,
            textbook: self.textbook_name,
            unit: self.unit_name,
            lesson: self.lesson_name,
            format: self.format_name,
            exercise_type: self.type_name,
            distance,
        }
    }
}

/// List active exercises, newest first, or ranked by vector distance when a
/// search term embeds successfully.
pub async fn list_exercises(
    pool: &SqlitePool,
    embedding: &EmbeddingClient,
    query: &ListExercisesQuery,
) -> Result<ExercisePage> {
    // Oracle round-trip happens before any store work; no transaction is
    // ever held across it
    let embedded = match query.search.as_deref() {
        Some(text) => embedding.embed(text).await,
        None => None,
    };

    match embedded {
        Some(result) => rank_by_distance(pool, &result.embedding, query).await,
        None => list_by_recency(pool, query).await,
    }
}

async fn list_by_recency(pool: &SqlitePool, query: &ListExercisesQuery) -> Result<ExercisePage> {
    let limit = query.limit.max(1);

    let mut filter = String::from("WHERE e.deleted_at IS NULL");
    if query.search.is_some() {
        filter.push_str(" AND LOWER(e.question) LIKE LOWER(?)");
    }
    let pattern = query
        .search
        .as_deref()
        .map(|s| format!("%{}%", s));

    let count_sql = format!("SELECT COUNT(*) {HIT_JOINS} {filter}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(pattern) = &pattern {
        count_query = count_query.bind(pattern);
    }
    let total_records = count_query.fetch_one(pool).await?.max(0) as u64;

    let select_sql = format!(
        "SELECT {HIT_COLUMNS} {HIT_JOINS} {filter} ORDER BY e.created_at DESC LIMIT ? OFFSET ?"
    );
    let mut select_query = sqlx::query_as::<_, HitRow>(&select_sql);
    if let Some(pattern) = &pattern {
        select_query = select_query.bind(pattern);
    }
    let rows = select_query
        .bind(limit as i64)
        .bind(query.offset as i64)
        .fetch_all(pool)
        .await?;

    Ok(ExercisePage {
        data: rows.into_iter().map(|row| row.into_hit(None)).collect(),
        pagination: pagination(limit, query.offset, total_records),
    })
}

async fn rank_by_distance(
    pool: &SqlitePool,
    query_vector: &[f32],
    query: &ListExercisesQuery,
) -> Result<ExercisePage> {
    let limit = query.limit.max(1);

    let select_sql = format!(
        "SELECT {HIT_COLUMNS} {HIT_JOINS} \
         WHERE e.deleted_at IS NULL AND e.question_embedding IS NOT NULL \
         ORDER BY e.created_at DESC"
    );
    let rows = sqlx::query_as::<_, HitRow>(&select_sql)
        .fetch_all(pool)
        .await?;

    let total_records = rows.len() as u64;

    let mut scored: Vec<(Option<f64>, HitRow)> = rows
        .into_iter()
        .map(|row| {
            let distance = row
                .exercise
                .question_embedding
                .as_deref()
                .and_then(|json| serde_json::from_str::<Vec<f32>>(json).ok())
                .and_then(|stored| l2_distance(query_vector, &stored));
            (distance, row)
        })
        .collect();

    // Stable sort keeps the recency order among equal distances; rows whose
    // stored vector cannot be compared rank last
    scored.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let data = scored
        .into_iter()
        .skip(query.offset as usize)
        .take(limit as usize)
        .map(|(distance, row)| row.into_hit(distance))
        .collect();

    Ok(ExercisePage {
        data,
        pagination: pagination(limit, query.offset, total_records),
    })
}

fn pagination(limit: u32, offset: u32, total_records: u64) -> Pagination {
    Pagination {
        limit,
        offset,
        total_records,
        total_pages: total_records.div_ceil(limit as u64),
    }
}

/// Euclidean distance; `None` when the dimensions disagree.
fn l2_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum();
    Some(sum.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::import::{import_exercises, ExerciseImportRow};
    use tempfile::TempDir;

    fn row(question: &str, key: &str) -> ExerciseImportRow {
        ExerciseImportRow {
            grade: "10".into(),
            textbook: "Algebra I".into(),
            unit: "Ch1".into(),
            lesson: "L1".into(),
            format: "MCQ".into(),
            exercise_type: None,
            question: question.into(),
            solution: "s".into(),
            key: key.into(),
            has_image: false,
        }
    }

    async fn seeded_db() -> (TempDir, SqlitePool) {
        let temp_dir = TempDir::new().unwrap();
        let pool = exbank_common::db::init_database(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        import_exercises(
            &pool,
            vec![row("near", "A"), row("far", "B"), row("no vector", "C")],
            "tester",
        )
        .await
        .unwrap();
        (temp_dir, pool)
    }

    async fn set_embedding(pool: &SqlitePool, question: &str, vector: &[f32]) {
        sqlx::query("UPDATE exercises SET question_embedding = ? WHERE question = ?")
            .bind(serde_json::to_string(vector).unwrap())
            .bind(question)
            .execute(pool)
            .await
            .unwrap();
    }

    #[test]
    fn test_l2_distance() {
        assert_eq!(l2_distance(&[0.0, 0.0], &[3.0, 4.0]), Some(5.0));
        assert_eq!(l2_distance(&[0.0], &[3.0, 4.0]), None);
    }

    #[tokio::test]
    async fn test_rank_by_distance_orders_and_counts() {
        let (_tmp, pool) = seeded_db().await;
        set_embedding(&pool, "near", &[1.0, 0.0]).await;
        set_embedding(&pool, "far", &[10.0, 0.0]).await;

        let query = ListExercisesQuery {
            search: Some("unused".into()),
            limit: 10,
            offset: 0,
        };
        let page = rank_by_distance(&pool, &[0.0, 0.0], &query).await.unwrap();

        // Only the two exercises carrying a vector qualify
        assert_eq!(page.pagination.total_records, 2);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].question, "near");
        assert_eq!(page.data[1].question, "far");
        assert!(page.data[0].distance.unwrap() < page.data[1].distance.unwrap());
    }

    #[tokio::test]
    async fn test_rank_by_distance_paginates_after_sorting() {
        let (_tmp, pool) = seeded_db().await;
        set_embedding(&pool, "near", &[1.0, 0.0]).await;
        set_embedding(&pool, "far", &[10.0, 0.0]).await;

        let query = ListExercisesQuery {
            search: Some("unused".into()),
            limit: 1,
            offset: 1,
        };
        let page = rank_by_distance(&pool, &[0.0, 0.0], &query).await.unwrap();

        assert_eq!(page.pagination.total_pages, 2);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].question, "far");
    }
}
