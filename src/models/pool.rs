use serde::{Deserialize, Serialize};

/// Account balance in the coin's smallest unit (wei for ETH).
pub type Balance = u128;

pub type ChartData = Vec<ChartPoint>;

/// One rig as reported by the pool's worker listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub name: String,
    #[serde(rename = "isOnline")]
    pub online: bool,
    #[serde(default)]
    pub reported_hashrate: f64,
    #[serde(default, rename = "currentEffectiveHashrate")]
    pub effective_hashrate: f64,
    #[serde(default)]
    pub valid_shares: u64,
    #[serde(default)]
    pub stale_shares: u64,
    #[serde(default)]
    pub invalid_shares: u64,
    #[serde(default, alias = "lastSteen")]
    pub last_seen: i64,
}

impl WorkerStatus {
    pub fn new(name: impl Into<String>, online: bool) -> Self {
        Self {
            name: name.into(),
            online,
            reported_hashrate: 0.0,
            effective_hashrate: 0.0,
            valid_shares: 0,
            stale_shares: 0,
            invalid_shares: 0,
            last_seen: 0,
        }
    }
}

/// A single sample of a worker's performance chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub timestamp: i64,
    #[serde(default)]
    pub effective_hashrate: f64,
    #[serde(default)]
    pub average_effective_hashrate: f64,
    #[serde(default)]
    pub reported_hashrate: f64,
    #[serde(default)]
    pub valid_shares: u64,
    #[serde(default)]
    pub stale_shares: u64,
    #[serde(default)]
    pub invalid_shares: u64,
}
