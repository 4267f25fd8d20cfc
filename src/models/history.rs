use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::market::MarketContext;
use super::recommendation::RecommendationBatch;

/// Immutable audit record of one successful strategy run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub history_id: Uuid,

    /// Execution that produced this entry
    pub execution_id: Uuid,

    pub job_id: String,

    /// Strategy tag the batch came from
    pub strategy: String,

    /// Full batch snapshot as published to the cache
    pub batch: RecommendationBatch,

    /// Free-form context attached by the orchestrator
    pub metadata: serde_json::Value,

    /// Market state at write time
    pub market: MarketContext,

    pub recorded_at: DateTime<Utc>,
}

/// Filter for history queries; unset fields match everything
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryFilter {
    pub strategy: Option<String>,

    pub job_id: Option<String>,

    /// Inclusive lower bound on recorded_at
    pub from: Option<DateTime<Utc>>,

    /// Inclusive upper bound on recorded_at
    pub to: Option<DateTime<Utc>>,

    pub limit: Option<usize>,
}
