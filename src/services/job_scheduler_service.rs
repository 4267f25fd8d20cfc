use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::external::{StrategyRequest, StrategyRunner};
use crate::models::{ExecutionMetrics, ExecutionStatus, JobDefinition, JobType, MarketSession};
use crate::services::execution_tracker::{ExecutionOutcome, ExecutionTracker, TrackerError};
use crate::services::history_store::RecommendationHistoryStore;
use crate::services::market_clock::{GateDecision, MarketClock};
use crate::services::recommendation_cache::RecommendationCache;
use crate::services::retry::RetryingInvoker;

// Shared handles every job tick works against
#[derive(Clone)]
pub struct JobContext {
    pub clock: Arc<MarketClock>,
    pub tracker: Arc<ExecutionTracker>,
    pub cache: Arc<RecommendationCache>,
    pub history: Arc<RecommendationHistoryStore>,
    pub invoker: Arc<RetryingInvoker>,
    pub runner: Arc<dyn StrategyRunner>,
}

/// What a single tick resolved to. Returned from force-run calls and logged
/// for scheduled ticks.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub job_id: String,
    pub execution_id: Option<Uuid>,
    pub status: Option<ExecutionStatus>,
    /// True when the tick was dropped because an execution was in flight
    pub coalesced: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatusEntry {
    pub id: String,
    pub name: String,
    pub job_type: JobType,
    pub schedule: String,
    pub enabled: bool,
    pub next_run_time: Option<DateTime<Utc>>,
    pub active_execution_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub market_session: MarketSession,
    pub jobs: Vec<JobStatusEntry>,
}

/// Owns the cron trigger loop and the registered job definitions, and drives
/// every tick through the gate -> track -> invoke -> publish pipeline.
///
/// All collaborators arrive through `JobContext`; the orchestrator holds no
/// global state and can be constructed freely in tests.
pub struct JobOrchestrator {
    scheduler: JobScheduler,
    context: JobContext,
    jobs: Arc<DashMap<String, JobDefinition>>,
    job_order: Vec<String>,
    running: Arc<AtomicBool>,
}

impl JobOrchestrator {
    pub async fn new(
        context: JobContext,
        definitions: Vec<JobDefinition>,
    ) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to create scheduler: {}", e)))?;

        let jobs = Arc::new(DashMap::new());
        let mut job_order = Vec::new();
        for definition in definitions {
            definition.validate().map_err(AppError::Validation)?;
            job_order.push(definition.id.clone());
            jobs.insert(definition.id.clone(), definition);
        }

        Ok(Self {
            scheduler,
            context,
            jobs,
            job_order,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Register every definition with the trigger loop and start it.
    pub async fn start(&self) -> Result<(), AppError> {
        info!("🚀 Starting job orchestrator...");

        let policy = self.context.invoker.policy();
        info!(
            "Retry policy: {} attempts, {}s between attempts",
            policy.max_attempts,
            policy.delay.as_secs()
        );

        for job_id in &self.job_order {
            let definition = self.jobs.get(job_id).map(|d| d.clone());
            if let Some(definition) = definition {
                self.schedule_job(&definition).await?;
            }
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to start scheduler: {}", e)))?;
        self.running.store(true, Ordering::SeqCst);

        info!(
            "✅ Job orchestrator started with {} jobs",
            self.job_order.len()
        );
        Ok(())
    }

    /// Stop the trigger loop, then wait for in-flight executions to reach a
    /// terminal state, up to `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), AppError> {
        info!("🛑 Stopping job orchestrator...");

        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Scheduler(format!("Failed to stop scheduler: {}", e)))?;
        self.running.store(false, Ordering::SeqCst);

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let in_flight = self.context.tracker.running_count();
            if in_flight == 0 {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    "⚠️ Shutdown timeout reached with {} executions still running",
                    in_flight
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        info!("✅ Job orchestrator stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn context(&self) -> &JobContext {
        &self.context
    }

    pub fn job(&self, job_id: &str) -> Option<JobDefinition> {
        self.jobs.get(job_id).map(|d| d.clone())
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> Vec<JobDefinition> {
        self.job_order
            .iter()
            .filter_map(|id| self.jobs.get(id).map(|d| d.clone()))
            .collect()
    }

    /// Run one job immediately, outside its schedule. The market gate still
    /// applies unless `override_gate` is set. Works on disabled jobs too,
    /// since the call is an explicit operator action.
    pub async fn force_run(
        &self,
        job_id: &str,
        override_gate: bool,
    ) -> Result<RunOutcome, AppError> {
        let definition = self
            .job(job_id)
            .ok_or_else(|| AppError::NotFound(format!("job '{}' not found", job_id)))?;

        info!(
            "▶️ Force-running job {} (override_gate: {})",
            job_id, override_gate
        );
        Ok(run_job_once(&self.context, &definition, Utc::now(), override_gate).await)
    }

    /// Fan a force-run out over every enabled job and collect per-job
    /// outcomes.
    pub async fn force_run_all(&self, override_gate: bool) -> HashMap<String, RunOutcome> {
        let definitions: Vec<JobDefinition> = self
            .definitions()
            .into_iter()
            .filter(|d| d.enabled)
            .collect();

        info!("▶️ Force-running {} enabled jobs", definitions.len());

        let outcomes = join_all(
            definitions
                .iter()
                .map(|d| run_job_once(&self.context, d, Utc::now(), override_gate)),
        )
        .await;

        definitions
            .iter()
            .map(|d| d.id.clone())
            .zip(outcomes)
            .collect()
    }

    pub fn enable(&self, job_id: &str) -> Result<JobDefinition, AppError> {
        self.set_enabled(job_id, true)
    }

    pub fn disable(&self, job_id: &str) -> Result<JobDefinition, AppError> {
        self.set_enabled(job_id, false)
    }

    /// Trigger-loop state plus a per-job schedule snapshot.
    pub fn status(&self) -> SchedulerStatus {
        let now = Utc::now();

        let jobs = self
            .job_order
            .iter()
            .filter_map(|id| {
                let definition = self.jobs.get(id)?;
                Some(JobStatusEntry {
                    id: definition.id.clone(),
                    name: definition.name.clone(),
                    job_type: definition.job_type,
                    schedule: definition.schedule.clone(),
                    enabled: definition.enabled,
                    next_run_time: next_run_after(&definition.schedule, now),
                    active_execution_id: self
                        .context
                        .tracker
                        .active(&definition.id)
                        .map(|e| e.execution_id),
                })
            })
            .collect();

        SchedulerStatus {
            running: self.is_running(),
            market_session: self.context.clock.session(now),
            jobs,
        }
    }

    fn set_enabled(&self, job_id: &str, enabled: bool) -> Result<JobDefinition, AppError> {
        let mut entry = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| AppError::NotFound(format!("job '{}' not found", job_id)))?;
        entry.enabled = enabled;

        info!(
            "{} job {}",
            if enabled { "Enabled" } else { "Disabled" },
            job_id
        );
        Ok(entry.clone())
    }

    /// Register one cron trigger. The closure re-reads the definition on
    /// every tick so enable/disable takes effect without re-registration.
    async fn schedule_job(&self, definition: &JobDefinition) -> Result<(), AppError> {
        let context = self.context.clone();
        let jobs = self.jobs.clone();
        let job_id = definition.id.clone();

        let job = Job::new_async(definition.schedule.as_str(), move |_uuid, _l| {
            let context = context.clone();
            let jobs = jobs.clone();
            let job_id = job_id.clone();
            Box::pin(async move {
                let definition = match jobs.get(&job_id) {
                    Some(d) => d.clone(),
                    None => return,
                };
                if !definition.enabled {
                    debug!("Job {} is disabled, dropping tick", job_id);
                    return;
                }
                run_job_once(&context, &definition, Utc::now(), false).await;
            })
        })
        .map_err(|e| {
            AppError::Scheduler(format!("Failed to create job {}: {}", definition.id, e))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::Scheduler(format!("Failed to add job {}: {}", definition.id, e))
        })?;

        info!(
            "📅 Scheduled: {} - {} [cron: {}]",
            definition.id, definition.name, definition.schedule
        );
        Ok(())
    }
}

/// Drive one tick of one job through the full pipeline:
/// gate -> single-flight start -> invoke -> publish -> terminal record.
pub async fn run_job_once(
    context: &JobContext,
    definition: &JobDefinition,
    scheduled_time: DateTime<Utc>,
    override_gate: bool,
) -> RunOutcome {
    info!("🏃 Job tick: {}", definition.id);

    let decision = if override_gate {
        GateDecision::Run
    } else {
        context.clock.gate(scheduled_time, definition.job_type)
    };

    match decision {
        GateDecision::Run => {}
        GateDecision::Skip { session } => {
            return record_skip(
                context,
                definition,
                scheduled_time,
                format!("market {}", session),
            );
        }
        GateDecision::Error(reason) => {
            return record_skip(
                context,
                definition,
                scheduled_time,
                format!("gate error: {}", reason),
            );
        }
    }

    let execution_id = match context.tracker.start(definition, scheduled_time) {
        Ok(id) => id,
        Err(TrackerError::AlreadyRunning { execution_id, .. }) => {
            warn!(
                "⚠️ Job {} already running ({}), dropping tick",
                definition.id, execution_id
            );
            return RunOutcome {
                job_id: definition.id.clone(),
                execution_id: Some(execution_id),
                status: None,
                coalesced: true,
                detail: "coalesced with running execution".to_string(),
            };
        }
        Err(e) => {
            error!("Failed to start execution for {}: {}", definition.id, e);
            return RunOutcome {
                job_id: definition.id.clone(),
                execution_id: None,
                status: None,
                coalesced: false,
                detail: format!("tracker rejected start: {}", e),
            };
        }
    };

    let started_at = Utc::now();
    let outcome = match definition.job_type {
        JobType::Maintenance => run_maintenance(context, started_at),
        JobType::Analysis => run_analysis(context, definition, execution_id, started_at).await,
    };

    let status = outcome.status();
    let detail = match &outcome {
        ExecutionOutcome::Success { summary, .. } => summary.clone(),
        ExecutionOutcome::Failed { message, .. } => message.clone(),
        ExecutionOutcome::Skipped { reason } => reason.clone(),
    };

    if let Err(e) = context.tracker.complete(execution_id, outcome) {
        error!(
            "Failed to record completion for execution {}: {}",
            execution_id, e
        );
    }

    RunOutcome {
        job_id: definition.id.clone(),
        execution_id: Some(execution_id),
        status: Some(status),
        coalesced: false,
        detail,
    }
}

/// Invoke the strategy through the retrying invoker; on success publish the
/// normalized batch to the cache and append the history entry.
///
/// Failures leave cache and history untouched: stale entries stay readable
/// until their own TTL runs out.
async fn run_analysis(
    context: &JobContext,
    definition: &JobDefinition,
    execution_id: Uuid,
    started_at: DateTime<Utc>,
) -> ExecutionOutcome {
    let request = StrategyRequest {
        strategy: definition.strategy.clone(),
        job_id: definition.id.clone(),
        params: definition.params.clone(),
    };

    match context.invoker.invoke(context.runner.as_ref(), &request).await {
        Ok((batch, attempts)) => {
            let received = batch.len();
            let batch = batch.normalize();
            let invalid = received - batch.len();
            let summary = batch.summary();
            let duration_ms = (Utc::now() - started_at).num_milliseconds();

            context.cache.set(
                &definition.category,
                &definition.id,
                batch.clone(),
                definition.cache_ttl_seconds,
            );

            let market = context.clock.context(Utc::now());
            let metadata = serde_json::json!({
                "job_name": definition.name,
                "schedule": definition.schedule,
                "attempts": attempts,
            });
            context.history.append(
                execution_id,
                &definition.id,
                &definition.strategy,
                batch,
                metadata,
                market,
            );

            info!(
                "✅ Job completed: {} ({}, attempts: {}, duration: {}ms)",
                definition.id, summary, attempts, duration_ms
            );

            ExecutionOutcome::Success {
                summary: summary.to_string(),
                metrics: ExecutionMetrics {
                    records_total: summary.total as i32,
                    records_invalid: invalid as i32,
                    attempts,
                    duration_ms,
                },
            }
        }
        Err(err) => {
            let duration_ms = (Utc::now() - started_at).num_milliseconds();
            error!("❌ Job failed: {} - {}", definition.id, err);

            ExecutionOutcome::Failed {
                message: err.to_string(),
                details: Some(err.last.to_string()),
                metrics: Some(ExecutionMetrics {
                    records_total: 0,
                    records_invalid: 0,
                    attempts: err.attempts,
                    duration_ms,
                }),
            }
        }
    }
}

/// Builtin action for maintenance jobs: sweep expired cache entries.
fn run_maintenance(context: &JobContext, started_at: DateTime<Utc>) -> ExecutionOutcome {
    let removed = context.cache.cleanup_expired();
    let duration_ms = (Utc::now() - started_at).num_milliseconds();

    info!("🧹 Cache maintenance removed {} expired entries", removed);

    ExecutionOutcome::Success {
        summary: format!("removed {} expired cache entries", removed),
        metrics: ExecutionMetrics {
            records_total: removed as i32,
            records_invalid: 0,
            attempts: 1,
            duration_ms,
        },
    }
}

/// Record a gated tick as a Skipped execution. No invocation happens and
/// neither cache nor history is touched.
fn record_skip(
    context: &JobContext,
    definition: &JobDefinition,
    scheduled_time: DateTime<Utc>,
    reason: String,
) -> RunOutcome {
    info!("⏭️ Skipping {}: {}", definition.id, reason);

    match context.tracker.start(definition, scheduled_time) {
        Ok(execution_id) => {
            if let Err(e) = context.tracker.complete(
                execution_id,
                ExecutionOutcome::Skipped {
                    reason: reason.clone(),
                },
            ) {
                error!(
                    "Failed to record skip for execution {}: {}",
                    execution_id, e
                );
            }
            RunOutcome {
                job_id: definition.id.clone(),
                execution_id: Some(execution_id),
                status: Some(ExecutionStatus::Skipped),
                coalesced: false,
                detail: reason,
            }
        }
        Err(TrackerError::AlreadyRunning { execution_id, .. }) => RunOutcome {
            job_id: definition.id.clone(),
            execution_id: Some(execution_id),
            status: None,
            coalesced: true,
            detail: "coalesced with running execution".to_string(),
        },
        Err(e) => RunOutcome {
            job_id: definition.id.clone(),
            execution_id: None,
            status: None,
            coalesced: false,
            detail: format!("tracker rejected start: {}", e),
        },
    }
}

fn next_run_after(schedule: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    cron::Schedule::from_str(schedule).ok()?.after(&after).next()
}
