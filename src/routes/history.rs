use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use crate::errors::AppError;
use crate::models::{HistoryEntry, HistoryFilter};
use crate::state::AppState;

const MAX_QUERY_LIMIT: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(query_history))
}

/// GET /api/history - Recorded recommendation batches, newest first
///
/// Supports `strategy`, `job_id`, `from`, `to` (RFC 3339) and `limit`
/// query parameters.
async fn query_history(
    Query(filter): Query<HistoryFilter>,
    State(state): State<AppState>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    info!(
        "GET /api/history - strategy: {:?}, job_id: {:?}, limit: {:?}",
        filter.strategy, filter.job_id, filter.limit
    );

    if let Some(limit) = filter.limit {
        if limit == 0 || limit > MAX_QUERY_LIMIT {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_QUERY_LIMIT
            )));
        }
    }

    Ok(Json(state.history.query(&filter)))
}
