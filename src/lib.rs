//! Signaldesk backend: market-aware job scheduling, execution tracking, and
//! recommendation publishing for the Signaldesk trading platform.

pub mod app;
pub mod config;
pub mod errors;
pub mod external;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
