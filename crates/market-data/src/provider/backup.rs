//! Independent backup source for the previous close.
//!
//! Consulted once, after every Yahoo tier has failed. It does not share the
//! Yahoo session and is not subject to the rate gate.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::MarketDataError;
use crate::provider::{Transport, UpstreamRequest};

const SCRAPER_API_URL: &str = "https://api.scraperapi.com/structured/yahoo/quote";
const PROVIDER_ID: &str = "SCRAPER_API";

/// A last-resort provider for the previous close.
#[async_trait]
pub trait BackupSource: Send + Sync {
    /// Identifier used in logs, e.g. "SCRAPER_API".
    fn id(&self) -> &'static str;

    /// Previous close for an already-normalized symbol.
    async fn previous_close(&self, symbol: &str, days_ago: u32) -> Result<f64, MarketDataError>;
}

/// Structured Yahoo quote response from ScraperAPI.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuredQuote {
    previous_close: Option<Value>,
    // Note: the structured payload carries the full quote page; only previousClose is read
}

/// ScraperAPI's structured Yahoo quote endpoint.
///
/// Only knows today's quote page, so it answers `days_ago == 0` only.
pub struct ScraperApiBackup {
    transport: Arc<dyn Transport>,
    api_key: String,
    base_url: String,
}

impl ScraperApiBackup {
    pub fn new(transport: Arc<dyn Transport>, api_key: String) -> Self {
        Self {
            transport,
            api_key,
            base_url: SCRAPER_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl BackupSource for ScraperApiBackup {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn previous_close(&self, symbol: &str, days_ago: u32) -> Result<f64, MarketDataError> {
        if days_ago != 0 {
            return Err(MarketDataError::Backup {
                message: format!("{} only serves the latest previous close", PROVIDER_ID),
            });
        }

        let request = UpstreamRequest::get(self.base_url.clone())
            .query("api_key", self.api_key.clone())
            .query("symbol", symbol);

        debug!("Requesting backup previous close for {}", symbol);

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| MarketDataError::Backup {
                message: format!("Request failed: {}", e),
            })?;

        if !response.is_success() {
            return Err(MarketDataError::Backup {
                message: format!("HTTP {}", response.status),
            });
        }

        let quote: StructuredQuote =
            serde_json::from_str(&response.body).map_err(|e| MarketDataError::Backup {
                message: format!("Failed to parse response: {}", e),
            })?;

        quote
            .previous_close
            .as_ref()
            .and_then(parse_price)
            .ok_or_else(|| MarketDataError::Backup {
                message: "previousClose missing from response".to_string(),
            })
    }
}

/// Accepts `2891.5` as well as `"2,891.50"`.
fn parse_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}
