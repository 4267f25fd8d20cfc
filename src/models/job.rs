use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Category of a scheduled job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobType {
    /// Invokes a strategy and publishes recommendations
    #[serde(rename = "analysis")]
    Analysis,

    /// Internal housekeeping; runs regardless of market state
    #[serde(rename = "maintenance")]
    Maintenance,
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::Analysis => write!(f, "analysis"),
            JobType::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// Lifecycle state of a single job execution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Created but not yet dispatched
    #[serde(rename = "pending")]
    Pending,

    /// Dispatched and currently in flight
    #[serde(rename = "running")]
    Running,

    #[serde(rename = "success")]
    Success,

    #[serde(rename = "failed")]
    Failed,

    /// Dropped without invocation (market gate or disabled job)
    #[serde(rename = "skipped")]
    Skipped,
}

impl ExecutionStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Success | ExecutionStatus::Failed | ExecutionStatus::Skipped
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "pending"),
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Parameters forwarded to the strategy runner on every invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Symbols the strategy should analyze
    pub symbols: Vec<String>,

    /// History window the strategy may look back over
    pub lookback_days: u32,

    /// Records below this confidence are not requested
    pub min_confidence: f64,

    /// Upper bound on records per batch
    pub max_results: usize,
}

/// A registered periodic job.
///
/// Definitions are built once at startup and validated before registration;
/// only the `enabled` flag changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Stable identifier, also the cache key its results publish under
    pub id: String,

    /// Human-readable name for logs and status output
    pub name: String,

    pub job_type: JobType,

    /// Cache category the job publishes into
    pub category: String,

    /// Six-field cron expression (seconds first)
    pub schedule: String,

    /// Strategy tag passed to the runner
    pub strategy: String,

    pub params: StrategyParams,

    /// TTL applied to the cache entry written on success
    pub cache_ttl_seconds: i64,

    pub enabled: bool,
}

impl JobDefinition {
    /// Reject malformed definitions before they reach the scheduler.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty()
            || !self
                .id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(format!(
                "job id '{}' must be non-empty lowercase alphanumeric/underscore",
                self.id
            ));
        }
        if self.name.trim().is_empty() {
            return Err(format!("job '{}': name must not be empty", self.id));
        }
        if self.category.trim().is_empty() {
            return Err(format!("job '{}': category must not be empty", self.id));
        }

        cron::Schedule::from_str(&self.schedule)
            .map_err(|e| format!("job '{}': invalid schedule '{}': {}", self.id, self.schedule, e))?;

        let symbol_re = Regex::new(r"^[A-Z][A-Z0-9.-]{0,9}$").unwrap();
        for symbol in &self.params.symbols {
            if !symbol_re.is_match(symbol) {
                return Err(format!("job '{}': invalid symbol '{}'", self.id, symbol));
            }
        }

        if self.cache_ttl_seconds <= 0 {
            return Err(format!(
                "job '{}': cache_ttl_seconds must be positive, got {}",
                self.id, self.cache_ttl_seconds
            ));
        }
        if self.params.max_results == 0 {
            return Err(format!("job '{}': max_results must be at least 1", self.id));
        }
        if !(0.0..=1.0).contains(&self.params.min_confidence) {
            return Err(format!(
                "job '{}': min_confidence must be within [0, 1], got {}",
                self.id, self.params.min_confidence
            ));
        }
        if self.params.lookback_days == 0 {
            return Err(format!("job '{}': lookback_days must be at least 1", self.id));
        }

        Ok(())
    }
}

/// One recorded run of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    pub execution_id: Uuid,

    pub job_id: String,

    pub job_name: String,

    pub job_type: JobType,

    /// Trigger instant this run answers to
    pub scheduled_time: DateTime<Utc>,

    /// When the run was actually picked up
    pub start_time: DateTime<Utc>,

    /// Set exactly once, on transition to a terminal state
    pub end_time: Option<DateTime<Utc>>,

    pub status: ExecutionStatus,

    /// Snapshot of the parameters the run was invoked with
    pub parameters: serde_json::Value,

    /// Short human-readable result line
    pub output_summary: Option<String>,

    pub metrics: Option<ExecutionMetrics>,

    pub error_message: Option<String>,

    pub error_details: Option<String>,
}

/// Outcome counters attached to a terminal execution
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    /// Records in the batch after normalization
    pub records_total: i32,

    /// Records dropped by normalization
    pub records_invalid: i32,

    /// Runner attempts consumed, including the successful one
    pub attempts: u32,

    pub duration_ms: i64,
}

/// Aggregate counters for one job across its recorded history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStats {
    pub job_id: String,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_status: Option<ExecutionStatus>,
    /// Mean wall time of terminal runs, when any completed
    pub avg_duration_ms: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> JobDefinition {
        JobDefinition {
            id: "intraday_signals".to_string(),
            name: "Intraday Signals".to_string(),
            job_type: JobType::Analysis,
            category: "intraday".to_string(),
            schedule: "0 2/5 * * * *".to_string(),
            strategy: "intraday_momentum".to_string(),
            params: StrategyParams {
                symbols: vec!["AAPL".to_string(), "BRK.B".to_string()],
                lookback_days: 30,
                min_confidence: 0.5,
                max_results: 20,
            },
            cache_ttl_seconds: 300,
            enabled: true,
        }
    }

    #[test]
    fn test_valid_definition_passes() {
        assert!(definition().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_id() {
        let mut def = definition();
        def.id = "Intraday Signals".to_string();
        assert!(def.validate().is_err());

        def.id = String::new();
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_schedule() {
        let mut def = definition();
        def.schedule = "every 5 minutes".to_string();
        let err = def.validate().unwrap_err();
        assert!(err.contains("invalid schedule"));
    }

    #[test]
    fn test_rejects_bad_symbol() {
        let mut def = definition();
        def.params.symbols.push("aapl!".to_string());
        let err = def.validate().unwrap_err();
        assert!(err.contains("invalid symbol"));
    }

    #[test]
    fn test_rejects_bad_bounds() {
        let mut def = definition();
        def.cache_ttl_seconds = 0;
        assert!(def.validate().is_err());

        let mut def = definition();
        def.params.min_confidence = 1.5;
        assert!(def.validate().is_err());

        let mut def = definition();
        def.params.max_results = 0;
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Success.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Skipped.is_terminal());
    }

    #[test]
    fn test_status_serde_names() {
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(
            serde_json::from_str::<ExecutionStatus>("\"skipped\"").unwrap(),
            ExecutionStatus::Skipped
        );
    }
}
