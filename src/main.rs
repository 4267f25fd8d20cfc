use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info};

use signaldesk_backend::app;
use signaldesk_backend::config::{self, AppConfig};
use signaldesk_backend::external::{HttpStrategyRunner, StrategyRunner};
use signaldesk_backend::jobs;
use signaldesk_backend::logging::{self, LoggingConfig};
use signaldesk_backend::services::{
    ExecutionTracker, JobContext, JobOrchestrator, MarketClock, RecommendationCache,
    RecommendationHistoryStore, RetryingInvoker, RetryPolicy,
};
use signaldesk_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    logging::init_logging(LoggingConfig::from_env())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let config = AppConfig::from_env();
    config.validate().map_err(anyhow::Error::msg)?;

    let test_mode = jobs::test_mode_from_env();
    if test_mode {
        info!("⚠️ JOB_SCHEDULER_TEST_MODE enabled, using compressed schedules");
    }

    let clock = Arc::new(MarketClock::new(config::calendar_from_env()));
    let tracker = Arc::new(ExecutionTracker::new(config.execution_history_limit));
    let cache = Arc::new(RecommendationCache::new(config.cache_capacity_per_category));
    let history = Arc::new(RecommendationHistoryStore::new());
    let invoker = Arc::new(RetryingInvoker::new(RetryPolicy::from_env()));
    let runner: Arc<dyn StrategyRunner> = Arc::new(HttpStrategyRunner::from_env()?);

    let context = JobContext {
        clock: clock.clone(),
        tracker: tracker.clone(),
        cache: cache.clone(),
        history: history.clone(),
        invoker,
        runner,
    };

    let orchestrator =
        Arc::new(JobOrchestrator::new(context, jobs::default_jobs(test_mode)).await?);
    orchestrator.start().await?;

    let state = AppState {
        orchestrator: orchestrator.clone(),
        clock,
        tracker,
        cache,
        history,
    };
    let app = app::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(&addr).await?;
    info!("🚀 Signaldesk backend running at http://{}/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator
        .shutdown(Duration::from_secs(config.shutdown_timeout_seconds))
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🛑 Shutdown signal received"),
        Err(e) => error!("❌ Failed to listen for shutdown signal: {}", e),
    }
}
