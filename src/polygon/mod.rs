//! Polygon.io Market Data Integration
//!
//! Implements the workflow's `DataProvider` on top of the Polygon.io
//! aggregates REST endpoint.
//!
//! # Components
//!
//! - [`client`] - HTTP client and `DataProvider` impl
//! - [`models`] - Response data types
//!
//! # Usage
//!
//! ```rust,ignore
//! use polygon::{PolygonClient, DEFAULT_BASE_URL};
//!
//! let client = PolygonClient::new(api_key, DEFAULT_BASE_URL.to_string())?;
//! let bars = client.get_bars("C:XAUUSD", Timeframe::FOUR_HOUR, start, end).await?;
//! ```

pub mod client;
pub mod models;

pub use client::{PolygonClient, DEFAULT_BASE_URL};
pub use models::{AggregateBar, AggregatesResponse};
