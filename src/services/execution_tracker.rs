use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    ExecutionMetrics, ExecutionStatus, JobDefinition, JobExecution, JobStats,
};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("job '{job_id}' already has a running execution {execution_id}")]
    AlreadyRunning { job_id: String, execution_id: Uuid },

    #[error("unknown execution {0}")]
    UnknownExecution(Uuid),

    #[error("execution {execution_id} is already terminal ({status})")]
    AlreadyTerminal {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Terminal result reported back to the tracker. Only terminal shapes exist,
/// so a completion can never leave an execution in Running.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Success {
        summary: String,
        metrics: ExecutionMetrics,
    },
    Failed {
        message: String,
        details: Option<String>,
        metrics: Option<ExecutionMetrics>,
    },
    Skipped {
        reason: String,
    },
}

impl ExecutionOutcome {
    pub fn status(&self) -> ExecutionStatus {
        match self {
            ExecutionOutcome::Success { .. } => ExecutionStatus::Success,
            ExecutionOutcome::Failed { .. } => ExecutionStatus::Failed,
            ExecutionOutcome::Skipped { .. } => ExecutionStatus::Skipped,
        }
    }
}

/// In-memory execution ledger with single-flight enforcement per job.
///
/// `active` maps each job id to its one non-terminal execution; the entry API
/// makes the start check-and-set atomic. Per-job rings bound how much history
/// is retained.
#[derive(Clone)]
pub struct ExecutionTracker {
    executions: Arc<DashMap<Uuid, JobExecution>>,
    active: Arc<DashMap<String, Uuid>>,
    recent: Arc<DashMap<String, Mutex<VecDeque<Uuid>>>>,
    history_limit: usize,
}

impl ExecutionTracker {
    pub fn new(history_limit: usize) -> Self {
        Self {
            executions: Arc::new(DashMap::new()),
            active: Arc::new(DashMap::new()),
            recent: Arc::new(DashMap::new()),
            history_limit: history_limit.max(1),
        }
    }

    /// Open an execution for a job, enforcing at most one non-terminal
    /// execution per job id. The new record starts in Running.
    pub fn start(
        &self,
        job: &JobDefinition,
        scheduled_time: DateTime<Utc>,
    ) -> Result<Uuid, TrackerError> {
        let execution_id = Uuid::new_v4();

        match self.active.entry(job.id.clone()) {
            Entry::Occupied(existing) => {
                return Err(TrackerError::AlreadyRunning {
                    job_id: job.id.clone(),
                    execution_id: *existing.get(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(execution_id);
            }
        }

        // Clamp against clock jitter so start_time never precedes the
        // trigger instant it answers to.
        let start_time = Utc::now().max(scheduled_time);

        let execution = JobExecution {
            execution_id,
            job_id: job.id.clone(),
            job_name: job.name.clone(),
            job_type: job.job_type,
            scheduled_time,
            start_time,
            end_time: None,
            status: ExecutionStatus::Running,
            parameters: serde_json::to_value(&job.params).unwrap_or(serde_json::Value::Null),
            output_summary: None,
            metrics: None,
            error_message: None,
            error_details: None,
        };

        self.executions.insert(execution_id, execution);
        self.push_recent(&job.id, execution_id);

        Ok(execution_id)
    }

    /// Transition an execution to its terminal state. Unknown or already
    /// terminal executions are reported as no-ops; nothing is rolled back.
    pub fn complete(
        &self,
        execution_id: Uuid,
        outcome: ExecutionOutcome,
    ) -> Result<JobExecution, TrackerError> {
        let mut entry = self
            .executions
            .get_mut(&execution_id)
            .ok_or(TrackerError::UnknownExecution(execution_id))?;

        if entry.status.is_terminal() {
            warn!(
                "⚠️ Ignoring completion for already-terminal execution {} ({})",
                execution_id, entry.status
            );
            return Err(TrackerError::AlreadyTerminal {
                execution_id,
                status: entry.status,
            });
        }

        entry.status = outcome.status();
        entry.end_time = Some(Utc::now().max(entry.start_time));
        match outcome {
            ExecutionOutcome::Success { summary, metrics } => {
                entry.output_summary = Some(summary);
                entry.metrics = Some(metrics);
            }
            ExecutionOutcome::Failed {
                message,
                details,
                metrics,
            } => {
                entry.error_message = Some(message);
                entry.error_details = details;
                entry.metrics = metrics;
            }
            ExecutionOutcome::Skipped { reason } => {
                entry.output_summary = Some(reason);
            }
        }

        let finished = entry.clone();
        drop(entry);

        // Free the single-flight slot only if it still points at us.
        self.active
            .remove_if(&finished.job_id, |_, id| *id == execution_id);

        Ok(finished)
    }

    pub fn execution(&self, execution_id: Uuid) -> Option<JobExecution> {
        self.executions.get(&execution_id).map(|e| e.clone())
    }

    /// The one non-terminal execution for a job, if any.
    pub fn active(&self, job_id: &str) -> Option<JobExecution> {
        let execution_id = *self.active.get(job_id)?;
        self.execution(execution_id)
    }

    /// Most recently started execution, running or terminal.
    pub fn last(&self, job_id: &str) -> Option<JobExecution> {
        let front = {
            let ring = self.recent.get(job_id)?;
            let guard = ring.lock();
            guard.front().copied()
        };
        front.and_then(|id| self.execution(id))
    }

    /// Recent executions for a job, newest first, up to `limit`.
    pub fn history(&self, job_id: &str, limit: usize) -> Vec<JobExecution> {
        let ids: Vec<Uuid> = match self.recent.get(job_id) {
            Some(ring) => {
                let guard = ring.lock();
                guard.iter().take(limit).copied().collect()
            }
            None => return Vec::new(),
        };

        ids.into_iter().filter_map(|id| self.execution(id)).collect()
    }

    /// Aggregate counters over the retained history of one job.
    pub fn stats(&self, job_id: &str) -> JobStats {
        let executions = self.history(job_id, usize::MAX);

        let mut stats = JobStats {
            job_id: job_id.to_string(),
            total: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            last_run_at: None,
            last_status: None,
            avg_duration_ms: None,
        };

        let mut duration_sum: i64 = 0;
        let mut duration_count: i64 = 0;

        for execution in &executions {
            stats.total += 1;
            match execution.status {
                ExecutionStatus::Success => stats.succeeded += 1,
                ExecutionStatus::Failed => stats.failed += 1,
                ExecutionStatus::Skipped => stats.skipped += 1,
                ExecutionStatus::Pending | ExecutionStatus::Running => {}
            }
            if let Some(end) = execution.end_time {
                duration_sum += (end - execution.start_time).num_milliseconds();
                duration_count += 1;
            }
        }

        if let Some(latest) = executions.first() {
            stats.last_run_at = Some(latest.start_time);
            stats.last_status = Some(latest.status);
        }
        if duration_count > 0 {
            stats.avg_duration_ms = Some(duration_sum / duration_count);
        }

        stats
    }

    /// Number of in-flight executions across all jobs.
    pub fn running_count(&self) -> usize {
        self.active.len()
    }

    fn push_recent(&self, job_id: &str, execution_id: Uuid) {
        let ring = self
            .recent
            .entry(job_id.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut guard = ring.lock();

        guard.push_front(execution_id);
        while guard.len() > self.history_limit {
            if let Some(evicted) = guard.pop_back() {
                self.executions.remove(&evicted);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobType, StrategyParams};

    fn definition(id: &str) -> JobDefinition {
        JobDefinition {
            id: id.to_string(),
            name: format!("Job {}", id),
            job_type: JobType::Analysis,
            category: "test".to_string(),
            schedule: "0 */5 * * * *".to_string(),
            strategy: "test_strategy".to_string(),
            params: StrategyParams {
                symbols: vec!["AAPL".to_string()],
                lookback_days: 30,
                min_confidence: 0.5,
                max_results: 10,
            },
            cache_ttl_seconds: 300,
            enabled: true,
        }
    }

    fn success_outcome() -> ExecutionOutcome {
        ExecutionOutcome::Success {
            summary: "ok".to_string(),
            metrics: ExecutionMetrics {
                records_total: 5,
                records_invalid: 0,
                attempts: 1,
                duration_ms: 12,
            },
        }
    }

    #[test]
    fn test_start_records_running_execution() {
        let tracker = ExecutionTracker::new(50);
        let job = definition("alpha");
        let scheduled = Utc::now();

        let id = tracker.start(&job, scheduled).unwrap();
        let execution = tracker.execution(id).unwrap();

        assert_eq!(execution.status, ExecutionStatus::Running);
        assert_eq!(execution.job_id, "alpha");
        assert!(execution.start_time >= execution.scheduled_time);
        assert!(execution.end_time.is_none());
        assert_eq!(tracker.running_count(), 1);
    }

    #[test]
    fn test_second_start_is_rejected_while_running() {
        let tracker = ExecutionTracker::new(50);
        let job = definition("alpha");

        let first = tracker.start(&job, Utc::now()).unwrap();
        let err = tracker.start(&job, Utc::now()).unwrap_err();

        match err {
            TrackerError::AlreadyRunning {
                job_id,
                execution_id,
            } => {
                assert_eq!(job_id, "alpha");
                assert_eq!(execution_id, first);
            }
            other => panic!("expected AlreadyRunning, got {:?}", other),
        }
    }

    #[test]
    fn test_start_allowed_again_after_completion() {
        let tracker = ExecutionTracker::new(50);
        let job = definition("alpha");

        let first = tracker.start(&job, Utc::now()).unwrap();
        tracker.complete(first, success_outcome()).unwrap();
        assert_eq!(tracker.running_count(), 0);

        let second = tracker.start(&job, Utc::now()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_single_flight_under_concurrent_starts() {
        let tracker = ExecutionTracker::new(50);
        let job = definition("alpha");

        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| tracker.start(&job, Utc::now())))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 7);
    }

    #[test]
    fn test_complete_sets_terminal_fields() {
        let tracker = ExecutionTracker::new(50);
        let id = tracker.start(&definition("alpha"), Utc::now()).unwrap();

        let finished = tracker.complete(id, success_outcome()).unwrap();

        assert_eq!(finished.status, ExecutionStatus::Success);
        assert_eq!(finished.output_summary.as_deref(), Some("ok"));
        assert_eq!(finished.metrics.unwrap().records_total, 5);
        assert!(finished.end_time.unwrap() >= finished.start_time);
    }

    #[test]
    fn test_double_complete_is_reported_and_ignored() {
        let tracker = ExecutionTracker::new(50);
        let id = tracker.start(&definition("alpha"), Utc::now()).unwrap();

        tracker.complete(id, success_outcome()).unwrap();
        let err = tracker
            .complete(
                id,
                ExecutionOutcome::Failed {
                    message: "late failure".to_string(),
                    details: None,
                    metrics: None,
                },
            )
            .unwrap_err();

        assert!(matches!(err, TrackerError::AlreadyTerminal { .. }));
        // First outcome stands
        assert_eq!(
            tracker.execution(id).unwrap().status,
            ExecutionStatus::Success
        );
    }

    #[test]
    fn test_complete_unknown_execution() {
        let tracker = ExecutionTracker::new(50);
        let err = tracker
            .complete(
                Uuid::new_v4(),
                ExecutionOutcome::Skipped {
                    reason: "nope".to_string(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, TrackerError::UnknownExecution(_)));
    }

    #[test]
    fn test_history_is_newest_first_and_bounded() {
        let tracker = ExecutionTracker::new(2);
        let job = definition("alpha");

        let mut ids = Vec::new();
        for _ in 0..3 {
            let id = tracker.start(&job, Utc::now()).unwrap();
            tracker.complete(id, success_outcome()).unwrap();
            ids.push(id);
        }

        let history = tracker.history("alpha", 10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].execution_id, ids[2]);
        assert_eq!(history[1].execution_id, ids[1]);
        // Evicted execution is gone entirely
        assert!(tracker.execution(ids[0]).is_none());
    }

    #[test]
    fn test_stats_aggregates_outcomes() {
        let tracker = ExecutionTracker::new(50);
        let job = definition("alpha");

        let a = tracker.start(&job, Utc::now()).unwrap();
        tracker.complete(a, success_outcome()).unwrap();

        let b = tracker.start(&job, Utc::now()).unwrap();
        tracker
            .complete(
                b,
                ExecutionOutcome::Failed {
                    message: "boom".to_string(),
                    details: None,
                    metrics: None,
                },
            )
            .unwrap();

        let c = tracker.start(&job, Utc::now()).unwrap();
        tracker
            .complete(
                c,
                ExecutionOutcome::Skipped {
                    reason: "market weekend".to_string(),
                },
            )
            .unwrap();

        let stats = tracker.stats("alpha");
        assert_eq!(stats.total, 3);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.last_status, Some(ExecutionStatus::Skipped));
        assert!(stats.avg_duration_ms.is_some());
    }

    #[test]
    fn test_active_lookup() {
        let tracker = ExecutionTracker::new(50);
        let job = definition("alpha");

        assert!(tracker.active("alpha").is_none());
        let id = tracker.start(&job, Utc::now()).unwrap();
        assert_eq!(tracker.active("alpha").unwrap().execution_id, id);

        tracker.complete(id, success_outcome()).unwrap();
        assert!(tracker.active("alpha").is_none());
    }
}
