//! HTTP request handlers
//!
//! REST endpoints for bulk import, node merging, tree listing, exercise
//! search, and embedding backfill.

use crate::api::server::AppContext;
use crate::curriculum;
use crate::curriculum::backfill::{BackfillOptions, BackfillResult};
use crate::curriculum::exercises::{ExercisePage, ListExercisesQuery};
use crate::curriculum::import::{ExerciseImportRow, ImportReport};
use crate::curriculum::merge::{MergeReport, MergeTable};
use crate::curriculum::tree::GradeNode;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use exbank_common::Error;
use serde::{Deserialize, Serialize};
use tracing::error;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub items: Vec<ExerciseImportRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub table: MergeTable,
    pub source_id: String,
    pub destination_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeQuery {
    /// Comma-separated grade guids; absent or empty means all grades
    pub grade_ids: Option<String>,
}

type HandlerError = (StatusCode, Json<StatusResponse>);

/// The acting user for audit columns, supplied by the (external) auth layer
fn actor_from(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

fn error_response(e: &Error) -> HandlerError {
    let status = match e {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "exbank-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Curriculum Endpoints
// ============================================================================

/// POST /curriculum/exercises/import - Bulk exercise import
pub async fn import_exercises(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportReport>, HandlerError> {
    let actor = actor_from(&headers);
    match curriculum::import::import_exercises(&ctx.db_pool, request.items, &actor).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            error!("Exercise import failed: {}", e);
            Err(error_response(&e))
        }
    }
}

/// POST /curriculum/merge - Merge two nodes of one hierarchy level
pub async fn merge(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(request): Json<MergeRequest>,
) -> Result<Json<MergeReport>, HandlerError> {
    // The same-id rule holds at the boundary as well as inside the engine
    if request.source_id == request.destination_id {
        return Err(error_response(&Error::InvalidInput(
            "sourceId and destinationId must be different".into(),
        )));
    }

    let actor = actor_from(&headers);
    match curriculum::merge::merge(
        &ctx.db_pool,
        request.table,
        &request.source_id,
        &request.destination_id,
        &actor,
    )
    .await
    {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            error!("Merge failed: {}", e);
            Err(error_response(&e))
        }
    }
}

/// GET /curriculum/tree - Sorted active hierarchy, optionally by grade
pub async fn tree(
    State(ctx): State<AppContext>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<Vec<GradeNode>>, HandlerError> {
    let grade_ids: Option<Vec<String>> = query.grade_ids.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    });

    match curriculum::tree::list_tree(&ctx.db_pool, grade_ids.as_deref()).await {
        Ok(grades) => Ok(Json(grades)),
        Err(e) => {
            error!("Tree listing failed: {}", e);
            Err(error_response(&e))
        }
    }
}

/// GET /curriculum/exercises - Paginated listing with optional search
pub async fn list_exercises(
    State(ctx): State<AppContext>,
    Query(query): Query<ListExercisesQuery>,
) -> Result<Json<ExercisePage>, HandlerError> {
    match curriculum::exercises::list_exercises(&ctx.db_pool, &ctx.embedding, &query).await {
        Ok(page) => Ok(Json(page)),
        Err(e) => {
            error!("Exercise listing failed: {}", e);
            Err(error_response(&e))
        }
    }
}

/// POST /curriculum/embeddings/backfill-exercises - Fill missing vectors
pub async fn backfill_embeddings(
    State(ctx): State<AppContext>,
    Query(options): Query<BackfillOptions>,
) -> Result<Json<BackfillResult>, HandlerError> {
    match curriculum::backfill::backfill_embeddings(&ctx.db_pool, &ctx.embedding, options).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            error!("Embedding backfill failed: {}", e);
            Err(error_response(&e))
        }
    }
}
