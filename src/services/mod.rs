mod execution_tracker;
mod history_store;
mod job_scheduler_service;
mod market_clock;
mod recommendation_cache;
mod retry;

pub use execution_tracker::{ExecutionOutcome, ExecutionTracker, TrackerError};
pub use history_store::RecommendationHistoryStore;
pub use job_scheduler_service::{
    run_job_once, JobContext, JobOrchestrator, JobStatusEntry, RunOutcome, SchedulerStatus,
};
pub use market_clock::{GateDecision, MarketClock};
pub use recommendation_cache::{CacheStats, RecommendationCache};
pub use retry::{InvokeError, RetryingInvoker, RetryPolicy};
