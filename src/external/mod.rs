mod http_strategy;
mod strategy_runner;

pub use http_strategy::HttpStrategyRunner;
pub use strategy_runner::{StrategyRequest, StrategyRunner, StrategyRunnerError};
