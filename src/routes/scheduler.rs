use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::JobDefinition;
use crate::services::{RunOutcome, SchedulerStatus};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(scheduler_status))
        .route("/run-all", post(run_all_jobs))
        .route("/jobs/:job_id/run", post(run_job))
        .route("/jobs/:job_id/enable", post(enable_job))
        .route("/jobs/:job_id/disable", post(disable_job))
}

#[derive(Debug, Deserialize)]
struct RunParams {
    #[serde(default)]
    override_gate: bool,
}

/// GET /api/scheduler/status - Trigger loop state and per-job schedule info
async fn scheduler_status(
    State(state): State<AppState>,
) -> Result<Json<SchedulerStatus>, AppError> {
    info!("GET /api/scheduler/status - Scheduler status");
    Ok(Json(state.orchestrator.status()))
}

/// POST /api/scheduler/jobs/:job_id/run - Run one job outside its schedule
async fn run_job(
    Path(job_id): Path<String>,
    Query(params): Query<RunParams>,
    State(state): State<AppState>,
) -> Result<Json<RunOutcome>, AppError> {
    info!(
        "POST /api/scheduler/jobs/{}/run - Manual trigger (override_gate: {})",
        job_id, params.override_gate
    );
    let outcome = state
        .orchestrator
        .force_run(&job_id, params.override_gate)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/scheduler/run-all - Run every enabled job now
async fn run_all_jobs(
    Query(params): Query<RunParams>,
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, RunOutcome>>, AppError> {
    info!(
        "POST /api/scheduler/run-all - Manual trigger for all enabled jobs (override_gate: {})",
        params.override_gate
    );
    Ok(Json(
        state.orchestrator.force_run_all(params.override_gate).await,
    ))
}

/// POST /api/scheduler/jobs/:job_id/enable - Resume scheduled runs for a job
async fn enable_job(
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<JobDefinition>, AppError> {
    info!("POST /api/scheduler/jobs/{}/enable - Enabling job", job_id);
    Ok(Json(state.orchestrator.enable(&job_id)?))
}

/// POST /api/scheduler/jobs/:job_id/disable - Pause scheduled runs for a job
async fn disable_job(
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<JobDefinition>, AppError> {
    info!("POST /api/scheduler/jobs/{}/disable - Disabling job", job_id);
    Ok(Json(state.orchestrator.disable(&job_id)?))
}
