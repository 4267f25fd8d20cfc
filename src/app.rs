use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{health, history, jobs, recommendations, scheduler};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/scheduler", scheduler::router())
        .nest("/api/jobs", jobs::router())
        .nest("/api/recommendations", recommendations::router())
        .nest("/api/history", history::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
