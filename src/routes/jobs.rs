use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{ExecutionStatus, JobDefinition, JobExecution, JobStats, JobType};
use crate::state::AppState;

const MAX_HISTORY_LIMIT: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs))
        .route("/:job_id/status", get(job_status))
        .route("/:job_id/history", get(job_history))
        .route("/:job_id/stats", get(job_stats))
}

#[derive(Serialize)]
struct JobInfo {
    id: String,
    name: String,
    job_type: JobType,
    category: String,
    schedule: String,
    enabled: bool,
    last_status: Option<ExecutionStatus>,
    last_run_at: Option<DateTime<Utc>>,
    active_execution_id: Option<Uuid>,
}

#[derive(Serialize)]
struct JobStatusResponse {
    definition: JobDefinition,
    active: Option<JobExecution>,
    last: Option<JobExecution>,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

/// GET /api/jobs - List all registered jobs with their latest run state
async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<JobInfo>>, AppError> {
    let jobs = state
        .orchestrator
        .definitions()
        .into_iter()
        .map(|definition| {
            let last = state.tracker.last(&definition.id);
            JobInfo {
                last_status: last.as_ref().map(|e| e.status),
                last_run_at: last.as_ref().map(|e| e.start_time),
                active_execution_id: state
                    .tracker
                    .active(&definition.id)
                    .map(|e| e.execution_id),
                id: definition.id,
                name: definition.name,
                job_type: definition.job_type,
                category: definition.category,
                schedule: definition.schedule,
                enabled: definition.enabled,
            }
        })
        .collect();

    Ok(Json(jobs))
}

/// GET /api/jobs/:job_id/status - Definition plus active and latest executions
async fn job_status(
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<JobStatusResponse>, AppError> {
    let definition = state
        .orchestrator
        .job(&job_id)
        .ok_or_else(|| AppError::NotFound(format!("job '{}' not found", job_id)))?;

    Ok(Json(JobStatusResponse {
        active: state.tracker.active(&job_id),
        last: state.tracker.last(&job_id),
        definition,
    }))
}

/// GET /api/jobs/:job_id/history - Recent executions, newest first
async fn job_history(
    Path(job_id): Path<String>,
    Query(params): Query<HistoryParams>,
    State(state): State<AppState>,
) -> Result<Json<Vec<JobExecution>>, AppError> {
    let limit = params.limit.unwrap_or(20);
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_HISTORY_LIMIT
        )));
    }

    if state.orchestrator.job(&job_id).is_none() {
        return Err(AppError::NotFound(format!("job '{}' not found", job_id)));
    }

    Ok(Json(state.tracker.history(&job_id, limit)))
}

/// GET /api/jobs/:job_id/stats - Aggregate execution counters for one job
async fn job_stats(
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<JobStats>, AppError> {
    if state.orchestrator.job(&job_id).is_none() {
        return Err(AppError::NotFound(format!("job '{}' not found", job_id)));
    }

    Ok(Json(state.tracker.stats(&job_id)))
}
