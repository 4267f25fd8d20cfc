//! Background job catalog.
//!
//! Every periodic job the orchestrator runs is defined here as data: a cron
//! trigger, a strategy tag, the parameters handed to the runner, and the
//! cache TTL its results publish under. The orchestrator registers each
//! definition and drives it through the market gate and execution tracker.
//!
//! Jobs are designed to be:
//! - Idempotent: a tick can be safely re-run or dropped
//! - Fault-tolerant: failures resolve to a terminal execution record
//! - Observable: every tick leaves an audit trail
//!
//! Analysis schedules are staggered so concurrent strategy invocations do
//! not land on the remote service at the same second.

use crate::models::{JobDefinition, JobType, StrategyParams};

/// Whether job schedules should be compressed for manual verification.
/// In test mode every job fires within a few minutes.
pub fn test_mode_from_env() -> bool {
    std::env::var("JOB_SCHEDULER_TEST_MODE")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false)
}

/// The default job catalog. All definitions validate; the orchestrator
/// rejects the whole catalog otherwise.
pub fn default_jobs(test_mode: bool) -> Vec<JobDefinition> {
    let core_symbols = vec![
        "AAPL".to_string(),
        "MSFT".to_string(),
        "NVDA".to_string(),
        "AMZN".to_string(),
        "GOOGL".to_string(),
        "META".to_string(),
        "TSLA".to_string(),
    ];

    let screening_symbols = vec![
        "AAPL".to_string(),
        "MSFT".to_string(),
        "NVDA".to_string(),
        "AMD".to_string(),
        "AVGO".to_string(),
        "JPM".to_string(),
        "XOM".to_string(),
        "UNH".to_string(),
        "COST".to_string(),
        "LLY".to_string(),
    ];

    vec![
        JobDefinition {
            id: "intraday_signals".to_string(),
            name: "Intraday Signals".to_string(),
            job_type: JobType::Analysis,
            category: "intraday".to_string(),
            schedule: if test_mode {
                "0 */1 * * * *".to_string()
            } else {
                "0 1/5 * * * *".to_string()
            },
            strategy: "intraday_momentum".to_string(),
            params: StrategyParams {
                symbols: core_symbols.clone(),
                lookback_days: 5,
                min_confidence: 0.6,
                max_results: 20,
            },
            cache_ttl_seconds: 600,
            enabled: true,
        },
        JobDefinition {
            id: "momentum_screening".to_string(),
            name: "Momentum Screening".to_string(),
            job_type: JobType::Analysis,
            category: "screening".to_string(),
            schedule: if test_mode {
                "0 */2 * * * *".to_string()
            } else {
                "0 3/5 * * * *".to_string()
            },
            strategy: "momentum_screen".to_string(),
            params: StrategyParams {
                symbols: screening_symbols,
                lookback_days: 30,
                min_confidence: 0.5,
                max_results: 25,
            },
            cache_ttl_seconds: 600,
            enabled: true,
        },
        JobDefinition {
            id: "swing_screening".to_string(),
            name: "Swing Screening".to_string(),
            job_type: JobType::Analysis,
            category: "swing".to_string(),
            schedule: if test_mode {
                "0 */3 * * * *".to_string()
            } else {
                "0 10,40 * * * *".to_string()
            },
            strategy: "swing_setups".to_string(),
            params: StrategyParams {
                symbols: core_symbols,
                lookback_days: 90,
                min_confidence: 0.55,
                max_results: 15,
            },
            cache_ttl_seconds: 3600,
            enabled: true,
        },
        JobDefinition {
            id: "cache_maintenance".to_string(),
            name: "Cache Maintenance".to_string(),
            job_type: JobType::Maintenance,
            category: "maintenance".to_string(),
            schedule: if test_mode {
                "30 */3 * * * *".to_string()
            } else {
                "0 55 * * * *".to_string()
            },
            strategy: "cache_sweep".to_string(),
            params: StrategyParams {
                symbols: Vec::new(),
                lookback_days: 1,
                min_confidence: 0.0,
                max_results: 1,
            },
            cache_ttl_seconds: 3600,
            enabled: true,
        },
    ]
}
