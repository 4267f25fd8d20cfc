use std::env;

use chrono::NaiveDate;

use crate::models::TradingCalendar;

/// Process-level settings loaded once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TCP port the HTTP server binds to
    pub port: u16,

    /// Maximum cached batches kept per category before FIFO eviction
    pub cache_capacity_per_category: usize,

    /// Completed executions retained per job in the in-memory ring
    pub execution_history_limit: usize,

    /// How long shutdown waits for in-flight job executions to finish
    pub shutdown_timeout_seconds: u64,
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", 3000),
            cache_capacity_per_category: env_parse("CACHE_CAPACITY_PER_CATEGORY", 32),
            execution_history_limit: env_parse("EXECUTION_HISTORY_LIMIT", 200),
            shutdown_timeout_seconds: env_parse("SHUTDOWN_TIMEOUT_SECONDS", 30),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("PORT must not be 0".to_string());
        }
        if self.execution_history_limit == 0 {
            return Err("EXECUTION_HISTORY_LIMIT must be at least 1".to_string());
        }
        if self.cache_capacity_per_category == 0 {
            return Err("CACHE_CAPACITY_PER_CATEGORY must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            cache_capacity_per_category: 32,
            execution_history_limit: 200,
            shutdown_timeout_seconds: 30,
        }
    }
}

/// Build the trading calendar from environment overrides.
///
/// `MARKET_CALENDAR` selects the base calendar (`us_equities` or `always_open`),
/// `MARKET_UTC_OFFSET_MINUTES` shifts the exchange timezone, and
/// `MARKET_EXTRA_HOLIDAYS` adds closure dates as a comma-separated list of
/// `YYYY-MM-DD` values.
pub fn calendar_from_env() -> TradingCalendar {
    let kind = env::var("MARKET_CALENDAR").unwrap_or_else(|_| "us_equities".to_string());
    let mut calendar = match kind.to_lowercase().as_str() {
        "always_open" => TradingCalendar::always_open(),
        _ => TradingCalendar::us_equities(),
    };

    if let Ok(raw) = env::var("MARKET_UTC_OFFSET_MINUTES") {
        match raw.parse::<i32>() {
            Ok(minutes) => calendar = calendar.with_utc_offset_minutes(minutes),
            Err(_) => {
                tracing::warn!("⚠️ Ignoring invalid MARKET_UTC_OFFSET_MINUTES: {}", raw);
            }
        }
    }

    if let Ok(raw) = env::var("MARKET_EXTRA_HOLIDAYS") {
        let dates: Vec<NaiveDate> = raw
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect();
        if !dates.is_empty() {
            calendar = calendar.with_extra_holidays(dates);
        }
    }

    calendar
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
