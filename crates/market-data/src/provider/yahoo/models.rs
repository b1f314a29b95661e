//! Yahoo Finance API response models.
//!
//! Only the fields the previous-close tiers read are modeled. Result lists
//! are optional because the upstream returns `"result": null` alongside an
//! error object when it has nothing to say.

use serde::Deserialize;

/// A numeric field that is either a plain number or a `{raw, fmt}` object.
///
/// The quote endpoint sends plain numbers, quoteSummary sends objects, and
/// either may send `{}` when the value is unknown.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum YahooNumber {
    Plain(f64),
    Detail(YahooPriceDetail),
}

impl YahooNumber {
    pub fn value(&self) -> Option<f64> {
        match self {
            YahooNumber::Plain(v) => Some(*v),
            YahooNumber::Detail(detail) => detail.raw,
        }
    }
}

/// Price detail with raw and formatted values
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct YahooPriceDetail {
    #[serde(default)]
    pub raw: Option<f64>,
    // Note: fmt field exists but we only use raw values
}

// ============================================================================
// /v7/finance/quote
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteResponse {
    pub quote_response: YahooQuoteEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct YahooQuoteEnvelope {
    #[serde(default)]
    pub result: Option<Vec<YahooQuoteResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteResult {
    pub symbol: Option<String>,
    pub regular_market_previous_close: Option<YahooNumber>,
}

// ============================================================================
// /v10/finance/quoteSummary
// ============================================================================

/// Main response wrapper for quoteSummary API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResponse {
    pub quote_summary: YahooQuoteSummary,
}

/// Quote summary container
#[derive(Debug, Deserialize)]
pub struct YahooQuoteSummary {
    #[serde(default)]
    pub result: Option<Vec<YahooQuoteSummaryResult>>,
}

/// Individual result from quoteSummary API
#[derive(Debug, Deserialize)]
pub struct YahooQuoteSummaryResult {
    pub price: Option<YahooPriceData>,
}

/// Price module from quoteSummary API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooPriceData {
    pub currency: Option<String>,
    pub regular_market_previous_close: Option<YahooNumber>,
}

// ============================================================================
// /v8/finance/chart
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct YahooChartResponse {
    pub chart: YahooChart,
}

#[derive(Debug, Deserialize)]
pub struct YahooChart {
    #[serde(default)]
    pub result: Option<Vec<YahooChartResult>>,
}

#[derive(Debug, Deserialize)]
pub struct YahooChartResult {
    #[serde(default)]
    pub timestamp: Option<Vec<i64>>,
    pub indicators: Option<YahooIndicators>,
}

#[derive(Debug, Deserialize)]
pub struct YahooIndicators {
    #[serde(default)]
    pub quote: Vec<YahooIndicatorQuote>,
}

/// OHLCV columns; individual entries are `null` for bars without a trade.
#[derive(Debug, Deserialize)]
pub struct YahooIndicatorQuote {
    #[serde(default)]
    pub close: Vec<Option<f64>>,
}
