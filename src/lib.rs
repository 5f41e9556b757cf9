//! Fairshares: polls a mining pool for worker status, charts and balances,
//! stores the results and raises offline notifications.

pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
