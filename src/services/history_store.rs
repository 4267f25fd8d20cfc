use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{HistoryEntry, HistoryFilter, MarketContext, RecommendationBatch};

const DEFAULT_QUERY_LIMIT: usize = 50;

/// Append-only log of every published recommendation batch.
///
/// There is deliberately no update or delete surface; retention is handled
/// outside this service.
#[derive(Clone)]
pub struct RecommendationHistoryStore {
    entries: Arc<RwLock<Vec<HistoryEntry>>>,
}

impl RecommendationHistoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Record a published batch together with the market context it was
    /// produced under. Returns the new entry's id.
    pub fn append(
        &self,
        execution_id: Uuid,
        job_id: &str,
        strategy: &str,
        batch: RecommendationBatch,
        metadata: serde_json::Value,
        market: MarketContext,
    ) -> Uuid {
        let history_id = Uuid::new_v4();
        let entry = HistoryEntry {
            history_id,
            execution_id,
            job_id: job_id.to_string(),
            strategy: strategy.to_string(),
            batch,
            metadata,
            market,
            recorded_at: Utc::now(),
        };

        self.entries.write().push(entry);
        history_id
    }

    /// Entries matching the filter, newest first.
    pub fn query(&self, filter: &HistoryFilter) -> Vec<HistoryEntry> {
        let limit = filter.limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        let entries = self.entries.read();

        entries
            .iter()
            .rev()
            .filter(|e| filter.strategy.as_deref().map_or(true, |s| e.strategy == s))
            .filter(|e| filter.job_id.as_deref().map_or(true, |j| e.job_id == j))
            .filter(|e| filter.from.map_or(true, |t| e.recorded_at >= t))
            .filter(|e| filter.to.map_or(true, |t| e.recorded_at <= t))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
