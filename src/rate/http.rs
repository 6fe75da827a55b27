//! HTTP rate provider.

use super::RateProvider;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Rate provider fetching `rates.TON.prices.RUB` from a JSON endpoint.
pub struct HttpRateProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpRateProvider {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn fetch(&self) -> anyhow::Result<f64> {
        let body: Value = self
            .client
            .get(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("rate request failed")?
            .json()
            .await
            .context("rate response was not JSON")?;

        body.pointer("/rates/TON/prices/RUB")
            .and_then(Value::as_f64)
            .context("rate field missing from response")
    }
}
