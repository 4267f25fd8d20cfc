use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use crate::errors::AppError;
use crate::models::RecommendationBatch;
use crate::services::CacheStats;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cache/stats", get(cache_stats))
        .route("/:category/:key", get(get_recommendations))
}

/// GET /api/recommendations/:category/:key
///
/// Latest cached batch for one category and key. Keys are the producing
/// job ids, so `/intraday/intraday_signals` returns whatever the intraday
/// job published last. Expired entries read as missing.
async fn get_recommendations(
    Path((category, key)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<RecommendationBatch>, AppError> {
    info!(
        "GET /api/recommendations/{}/{} - Cache lookup",
        category, key
    );

    state.cache.get(&category, &key).map(Json).ok_or_else(|| {
        AppError::NotFound(format!(
            "no cached recommendations for {}/{}",
            category, key
        ))
    })
}

/// GET /api/recommendations/cache/stats - Hit, miss, and eviction counters
async fn cache_stats(State(state): State<AppState>) -> Result<Json<CacheStats>, AppError> {
    info!("GET /api/recommendations/cache/stats - Cache stats");
    Ok(Json(state.cache.stats()))
}
