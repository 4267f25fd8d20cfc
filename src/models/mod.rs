mod history;
mod job;
mod market;
mod recommendation;

pub use history::{HistoryEntry, HistoryFilter};
pub use job::{
    ExecutionMetrics, ExecutionStatus, JobDefinition, JobExecution, JobStats, JobType,
    StrategyParams,
};
pub use market::{MarketContext, MarketSession, TradingCalendar};
pub use recommendation::{
    BatchSummary, RecommendationBatch, RecommendationRecord, SignalAction, SignalStrength,
};
