use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where a resolved price came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceSource {
    /// Fresh cache entry, no upstream call made
    Cache,
    /// `/v7/finance/quote`
    Quote,
    /// `/v10/finance/quoteSummary`
    QuoteSummary,
    /// `/v8/finance/chart`
    Chart,
    /// The independent backup provider
    Backup,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::Cache => "CACHE",
            PriceSource::Quote => "QUOTE",
            PriceSource::QuoteSummary => "QUOTE_SUMMARY",
            PriceSource::Chart => "CHART",
            PriceSource::Backup => "BACKUP",
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closing price N trading days ago.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousClose {
    pub price: Decimal,

    /// Served from the stale window after every upstream failed
    pub stale: bool,

    /// For stale serves this is the source of the cached value
    pub source: PriceSource,
}

impl PreviousClose {
    pub fn fresh(price: Decimal, source: PriceSource) -> Self {
        Self {
            price,
            stale: false,
            source,
        }
    }

    pub fn used_backup(&self) -> bool {
        self.source == PriceSource::Backup
    }
}
