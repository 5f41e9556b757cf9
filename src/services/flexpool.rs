//! Flexpool v2 REST client

use crate::error::FetchError;
use crate::models::{Balance, ChartData, WorkerStatus};
use crate::services::pool_api::FetchGateway;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// Every Flexpool response wraps its payload as `{"error": ..., "result": ...}`.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    error: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct BalanceResult {
    balance: Balance,
}

pub struct FlexpoolClient {
    client: Client,
    endpoint: String,
    coin: String,
}

impl FlexpoolClient {
    pub fn new(endpoint: impl Into<String>, coin: impl Into<String>) -> Self {
        Self::with_client(endpoint, coin, Client::new())
    }

    pub fn with_client(
        endpoint: impl Into<String>,
        coin: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            coin: coin.into(),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.endpoint, path);
        debug!(url = %url, "Flexpool: GET {}", path);

        let response = self
            .client
            .get(&url)
            .query(&[("coin", self.coin.as_str())])
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body: ApiResponse<T> = response.json().await?;
        if let Some(error) = body.error {
            return Err(FetchError::Api(error));
        }
        body.result.ok_or(FetchError::EmptyResult)
    }
}

#[async_trait]
impl FetchGateway for FlexpoolClient {
    async fn list_workers(&self, address: &str) -> Result<Vec<WorkerStatus>, FetchError> {
        self.get("/miner/workers", &[("address", address)]).await
    }

    async fn get_chart(&self, address: &str, worker_name: &str) -> Result<ChartData, FetchError> {
        self.get("/miner/chart", &[("address", address), ("worker", worker_name)])
            .await
    }

    async fn get_balance(&self, address: &str) -> Result<Balance, FetchError> {
        let result: BalanceResult = self.get("/miner/balance", &[("address", address)]).await?;
        Ok(result.balance)
    }
}
