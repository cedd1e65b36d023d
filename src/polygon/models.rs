//! Polygon.io Aggregates API Data Models

use crate::signal_core::Bar;
use chrono::DateTime;
use serde::Deserialize;

/// Response from `/v2/aggs/ticker/{ticker}/range/...`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatesResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub results_count: Option<u64>,
    #[serde(default)]
    pub results: Option<Vec<AggregateBar>>,
    /// Set on API-level errors (bad key, unknown ticker)
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Cursor URL for the next page; absent on the last page
    #[serde(default, rename = "next_url")]
    pub next_url: Option<String>,
}

/// One aggregate window. `t` is the window start in Unix milliseconds.
#[derive(Debug, Deserialize, Clone)]
pub struct AggregateBar {
    pub t: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    #[serde(default)]
    pub v: f64,
}

impl AggregateBar {
    /// `None` when the timestamp is out of range
    pub fn to_bar(&self) -> Option<Bar> {
        let timestamp = DateTime::from_timestamp_millis(self.t)?;
        Some(Bar::new(timestamp, self.o, self.h, self.l, self.c, self.v))
    }
}
