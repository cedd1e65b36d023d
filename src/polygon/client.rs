//! Polygon.io API Client
//!
//! HTTP client for the aggregates (OHLCV bars) endpoint.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::debug;

use super::models::*;
use crate::signal_core::{self, normalize_series, Bar, DataProvider, SignalError, Timeframe};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

/// Maximum bars returned by one aggregates page
const PAGE_LIMIT: u32 = 5000;

/// Pages followed before a request is treated as runaway
const MAX_PAGES: usize = 50;

pub struct PolygonClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PolygonClient {
    pub fn new(api_key: String, base_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn aggregates_url(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> String {
        format!(
            "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}",
            self.base_url,
            symbol,
            timeframe.multiplier,
            timeframe.unit.as_str(),
            start.timestamp_millis(),
            end.timestamp_millis()
        )
    }

    /// Fetch bars in `[start, end]`, sorted and de-duplicated.
    ///
    /// Follows `next_url` until the last page so the series reaches `end`.
    pub async fn fetch_aggregates(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>> {
        let url = self.aggregates_url(symbol, timeframe, start, end);
        debug!("GET {} ({} bars)", url, timeframe);

        let limit = PAGE_LIMIT.to_string();
        let mut request = self.client.get(&url).query(&[
            ("adjusted", "true"),
            ("sort", "asc"),
            ("limit", limit.as_str()),
            ("apiKey", self.api_key.as_str()),
        ]);

        let mut raw = Vec::new();
        let mut pages = 0;
        loop {
            let payload = self.fetch_page(request).await?;
            raw.extend(payload.results.unwrap_or_default());
            pages += 1;

            let Some(next) = payload.next_url else {
                break;
            };
            if pages >= MAX_PAGES {
                return Err(anyhow!(
                    "{} {} aggregates exceeded {} pages ({} bars so far)",
                    symbol,
                    timeframe,
                    MAX_PAGES,
                    raw.len()
                ));
            }
            debug!("GET {} (page {})", next, pages + 1);
            request = self
                .client
                .get(&next)
                .query(&[("apiKey", self.api_key.as_str())]);
        }

        let bars = raw
            .iter()
            .filter_map(AggregateBar::to_bar)
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect();
        Ok(normalize_series(bars))
    }

    async fn fetch_page(&self, request: RequestBuilder) -> Result<AggregatesResponse> {
        let response = request
            .send()
            .await
            .context("Failed to send aggregates request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Aggregates request failed with status {}: {}", status, body));
        }

        let payload: AggregatesResponse = response
            .json()
            .await
            .context("Failed to parse aggregates response")?;

        if let Some(err) = payload.error {
            return Err(anyhow!(
                "Polygon error ({}): {}",
                payload.status.unwrap_or_default(),
                err
            ));
        }

        Ok(payload)
    }
}

#[async_trait]
impl DataProvider for PolygonClient {
    async fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> signal_core::Result<Vec<Bar>> {
        let unavailable = |reason: String| SignalError::DataUnavailable {
            symbol: symbol.to_string(),
            timeframe,
            reason,
        };

        match self.fetch_aggregates(symbol, timeframe, start, end).await {
            Ok(bars) if bars.is_empty() => Err(unavailable("no results in range".to_string())),
            Ok(bars) => Ok(bars),
            Err(e) => Err(unavailable(format!("{:#}", e))),
        }
    }
}
