use std::sync::Arc;

use crate::services::{
    ExecutionTracker, JobOrchestrator, MarketClock, RecommendationCache,
    RecommendationHistoryStore,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<JobOrchestrator>,
    pub clock: Arc<MarketClock>,
    pub tracker: Arc<ExecutionTracker>,
    pub cache: Arc<RecommendationCache>,
    pub history: Arc<RecommendationHistoryStore>,
}
