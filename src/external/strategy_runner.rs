use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{RecommendationBatch, StrategyParams};

/// One invocation request handed to a strategy runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRequest {
    /// Strategy tag to invoke
    pub strategy: String,

    /// Job the invocation runs on behalf of
    pub job_id: String,

    pub params: StrategyParams,
}

#[derive(Debug, Error)]
pub enum StrategyRunnerError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimited,
}

/// Boundary to the signal-generation service.
///
/// The scheduling core sees only this trait; how recommendations are computed
/// stays on the other side of it.
#[async_trait]
pub trait StrategyRunner: Send + Sync {
    async fn run(
        &self,
        request: &StrategyRequest,
    ) -> Result<RecommendationBatch, StrategyRunnerError>;
}
