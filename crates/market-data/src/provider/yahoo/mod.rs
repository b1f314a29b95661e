//! Yahoo Finance data endpoints.
//!
//! Three endpoints can answer "previous close":
//! - `/v7/finance/quote` (snapshot, today only)
//! - `/v10/finance/quoteSummary` with the `price` module (today only)
//! - `/v8/finance/chart` (daily bars, any offset)
//!
//! Each is tried on the primary host and then, after a terminal failure, on
//! the secondary host. Extracting the value from a payload happens here;
//! choosing between endpoints is the resolver's job.

mod models;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use urlencoding::encode;

use crate::config::{MarketConfig, RetryPolicy};
use crate::errors::MarketDataError;
use crate::models::{DailyBar, DailySeries};
use crate::provider::{DataHost, FetchContext, ResilientFetcher};
use crate::session::SessionManager;

use models::{YahooChartResponse, YahooQuoteResponse, YahooQuoteSummaryResponse};

pub const PRIMARY_HOST: &str = "https://query2.finance.yahoo.com";
pub const SECONDARY_HOST: &str = "https://query1.finance.yahoo.com";

const QUOTE_PAGE_BASE: &str = "https://finance.yahoo.com";

/// Client for the Yahoo data endpoints behind a shared session.
pub struct YahooClient {
    fetcher: ResilientFetcher,
    session: Arc<SessionManager>,
    hosts: Vec<DataHost>,
    market: MarketConfig,
    retry: RetryPolicy,
}

impl YahooClient {
    pub fn new(
        fetcher: ResilientFetcher,
        session: Arc<SessionManager>,
        market: MarketConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            fetcher,
            session,
            hosts: vec![
                DataHost::new("query2", PRIMARY_HOST),
                DataHost::new("query1", SECONDARY_HOST),
            ],
            market,
            retry,
        }
    }

    /// Replace the host order, primary first.
    pub fn with_hosts(mut self, hosts: Vec<DataHost>) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// `regularMarketPreviousClose` from the quote snapshot.
    pub async fn previous_close_from_quote(&self, symbol: &str) -> Result<f64, MarketDataError> {
        let endpoint = "/v7/finance/quote";
        let payload = self
            .get_with_fallback(symbol, endpoint, vec![("symbols".to_string(), symbol.to_string())])
            .await?;
        let response: YahooQuoteResponse = parse(endpoint, payload)?;

        response
            .quote_response
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|quote| quote.regular_market_previous_close)
            .and_then(|value| value.value())
            .ok_or_else(|| no_data(endpoint, "regularMarketPreviousClose missing"))
    }

    /// `price.regularMarketPreviousClose` from quoteSummary.
    pub async fn previous_close_from_summary(&self, symbol: &str) -> Result<f64, MarketDataError> {
        let endpoint = "/v10/finance/quoteSummary";
        let path = format!("{}/{}", endpoint, encode(symbol));
        let payload = self
            .get_with_fallback(symbol, &path, vec![("modules".to_string(), "price".to_string())])
            .await?;
        let response: YahooQuoteSummaryResponse = parse(endpoint, payload)?;

        response
            .quote_summary
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|result| result.price)
            .and_then(|price| price.regular_market_previous_close)
            .and_then(|value| value.value())
            .ok_or_else(|| no_data(endpoint, "price.regularMarketPreviousClose missing"))
    }

    /// Daily bars for `range` (e.g. `10d`, `1y`, `max`).
    pub async fn daily_series(
        &self,
        symbol: &str,
        range: &str,
    ) -> Result<DailySeries, MarketDataError> {
        let endpoint = "/v8/finance/chart";
        let path = format!("{}/{}", endpoint, encode(symbol));
        let payload = self
            .get_with_fallback(
                symbol,
                &path,
                vec![
                    ("interval".to_string(), "1d".to_string()),
                    ("range".to_string(), range.to_string()),
                ],
            )
            .await?;
        let response: YahooChartResponse = parse(endpoint, payload)?;

        let result = response
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| no_data(endpoint, "chart result missing"))?;

        let timestamps = result.timestamp.unwrap_or_default();
        let closes = result
            .indicators
            .and_then(|indicators| indicators.quote.into_iter().next())
            .map(|quote| quote.close)
            .unwrap_or_default();

        if timestamps.is_empty() || closes.is_empty() {
            return Err(no_data(endpoint, "no daily bars"));
        }
        if timestamps.len() != closes.len() {
            debug!(
                "Chart for {} has {} timestamps but {} closes",
                symbol,
                timestamps.len(),
                closes.len()
            );
        }

        let bars = timestamps
            .into_iter()
            .zip(closes)
            .filter_map(|(ts, close)| {
                Utc.timestamp_opt(ts, 0)
                    .single()
                    .map(|timestamp| DailyBar { timestamp, close })
            })
            .collect();

        Ok(DailySeries::new(bars))
    }

    /// Try each host in order until one returns a usable payload.
    async fn get_with_fallback(
        &self,
        symbol: &str,
        path: &str,
        params: Vec<(String, String)>,
    ) -> Result<Value, MarketDataError> {
        let context = FetchContext::from_policy(&self.retry).with_referer(format!(
            "{}/quote/{}/",
            QUOTE_PAGE_BASE,
            encode(symbol)
        ));

        let mut last_error = None;
        for host in &self.hosts {
            let params = self.request_params(&params);
            match self.fetcher.fetch(host, path, &params, &context).await {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    if e.invalidates_session() {
                        self.session.invalidate();
                    }
                    warn!("{}{} failed for {}: {}", host.label, path, symbol, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| MarketDataError::FetchFailed {
            endpoint: path.to_string(),
            status: None,
            message: "no upstream hosts configured".to_string(),
        }))
    }

    fn request_params(&self, params: &[(String, String)]) -> Vec<(String, String)> {
        let mut all = params.to_vec();
        all.push(("region".to_string(), self.market.region.clone()));
        all.push(("lang".to_string(), self.market.lang.clone()));
        if let Some(crumb) = self.session.current().and_then(|artifacts| artifacts.crumb) {
            all.push(("crumb".to_string(), crumb));
        }
        all
    }
}

fn parse<T: DeserializeOwned>(endpoint: &str, payload: Value) -> Result<T, MarketDataError> {
    serde_json::from_value(payload).map_err(|e| no_data(endpoint, &format!("unexpected payload: {}", e)))
}

fn no_data(endpoint: &str, message: &str) -> MarketDataError {
    MarketDataError::NoData {
        endpoint: endpoint.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::clock::{ManualClock, SystemClock};
    use crate::config::SessionConfig;
    use crate::provider::ClientIdentity;
    use crate::rate_gate::RateGate;
    use crate::session::SessionEndpoints;
    use crate::testing::{chart_body, empty_body, html, json, quote_body, summary_body, ScriptedTransport};

    fn client(transport: Arc<ScriptedTransport>) -> YahooClient {
        let identity = Arc::new(ClientIdentity::new());
        let clock = Arc::new(SystemClock);
        let session = Arc::new(SessionManager::new(
            transport.clone(),
            identity.clone(),
            clock,
            &SessionConfig::default(),
            SessionEndpoints::default(),
        ));
        let fetcher = ResilientFetcher::new(
            transport,
            identity,
            Arc::new(RateGate::new(Duration::ZERO)),
        );
        let retry = RetryPolicy {
            max_retries: 1,
            backoff_base: Duration::from_millis(1),
        };
        YahooClient::new(fetcher, session, MarketConfig::default(), retry)
    }

    #[tokio::test]
    async fn test_quote_previous_close() {
        let transport = Arc::new(
            ScriptedTransport::with_session_defaults()
                .route("query2.finance.yahoo.com/v7/finance/quote", json(200, quote_body(3870.45))),
        );
        let client = client(transport.clone());
        client.session().ensure_session().await.unwrap();

        let close = client.previous_close_from_quote("TCS.NS").await.unwrap();
        assert_eq!(close, 3870.45);

        let request = transport
            .requests()
            .into_iter()
            .find(|r| r.url.contains("/v7/finance/quote"))
            .unwrap();
        assert_eq!(request.query_param("symbols"), Some("TCS.NS"));
        assert_eq!(request.query_param("region"), Some("IN"));
        assert_eq!(request.query_param("lang"), Some("en-IN"));
        assert_eq!(request.query_param("crumb"), Some("crumb123"));
        assert_eq!(
            request.referer.as_deref(),
            Some("https://finance.yahoo.com/quote/TCS.NS/")
        );
    }

    #[tokio::test]
    async fn test_empty_primary_falls_back_to_secondary() {
        let transport = Arc::new(
            ScriptedTransport::with_session_defaults()
                .route(
                    "query2.finance.yahoo.com/v7/finance/quote",
                    json(200, empty_body("quoteResponse")),
                )
                .route("query1.finance.yahoo.com/v7/finance/quote", json(200, quote_body(101.5))),
        );
        let client = client(transport.clone());

        assert_eq!(client.previous_close_from_quote("INFY.NS").await.unwrap(), 101.5);
        assert_eq!(transport.count("query2.finance.yahoo.com/v7/finance/quote"), 1);
        assert_eq!(transport.count("query1.finance.yahoo.com/v7/finance/quote"), 1);
    }

    #[tokio::test]
    async fn test_interstitial_invalidates_session() {
        let transport = Arc::new(
            ScriptedTransport::with_session_defaults()
                .route(
                    "query2.finance.yahoo.com/v7/finance/quote",
                    html(200, "https://guce.yahoo.com/consent"),
                )
                .route("query1.finance.yahoo.com/v7/finance/quote", json(200, quote_body(55.0))),
        );
        let client = client(transport.clone());
        client.session().ensure_session().await.unwrap();
        assert!(client.session().current().is_some());

        assert_eq!(client.previous_close_from_quote("ITC.NS").await.unwrap(), 55.0);
        assert!(client.session().current().is_none());
        // Interstitials are never retried on the same host
        assert_eq!(transport.count("query2.finance.yahoo.com/v7/finance/quote"), 1);
    }

    #[tokio::test]
    async fn test_both_hosts_fail_returns_last_error() {
        let transport = Arc::new(
            ScriptedTransport::with_session_defaults()
                .route("/v7/finance/quote", json(404, serde_json::json!({"finance": {}}))),
        );
        let client = client(transport.clone());

        let err = client.previous_close_from_quote("NOPE.NS").await.unwrap_err();
        assert!(matches!(
            err,
            MarketDataError::FetchFailed { ref endpoint, status: Some(404), .. } if endpoint.starts_with("query1")
        ));
    }

    #[tokio::test]
    async fn test_null_previous_close_is_no_data() {
        let transport = Arc::new(ScriptedTransport::with_session_defaults().route(
            "/v7/finance/quote",
            json(
                200,
                serde_json::json!({"quoteResponse": {"result": [{"symbol": "TCS.NS", "regularMarketPreviousClose": null}]}}),
            ),
        ));
        let client = client(transport.clone());

        let err = client.previous_close_from_quote("TCS.NS").await.unwrap_err();
        assert!(matches!(err, MarketDataError::NoData { .. }));
        // Parsing failures do not trigger the secondary host
        assert_eq!(transport.count("query1.finance.yahoo.com/v7/finance/quote"), 0);
    }

    #[tokio::test]
    async fn test_summary_previous_close() {
        let transport = Arc::new(
            ScriptedTransport::with_session_defaults()
                .route("/v10/finance/quoteSummary/TCS.NS", json(200, summary_body(3870.45))),
        );
        let client = client(transport.clone());

        assert_eq!(client.previous_close_from_summary("TCS.NS").await.unwrap(), 3870.45);
        let request = transport
            .requests()
            .into_iter()
            .find(|r| r.url.contains("quoteSummary"))
            .unwrap();
        assert_eq!(request.query_param("modules"), Some("price"));
    }

    #[tokio::test]
    async fn test_summary_accepts_plain_number() {
        let transport = Arc::new(ScriptedTransport::with_session_defaults().route(
            "/v10/finance/quoteSummary/",
            json(
                200,
                serde_json::json!({"quoteSummary": {"result": [{"price": {"regularMarketPreviousClose": 12.5}}]}}),
            ),
        ));
        let client = client(transport);

        assert_eq!(client.previous_close_from_summary("TCS.NS").await.unwrap(), 12.5);
    }

    #[tokio::test]
    async fn test_daily_series() {
        let transport = Arc::new(ScriptedTransport::with_session_defaults().route(
            "/v8/finance/chart/TCS.NS",
            json(
                200,
                chart_body(&[1714621500, 1714707900, 1714967100], &[Some(100.0), None, Some(102.0)]),
            ),
        ));
        let client = client(transport.clone());

        let series = client.daily_series("TCS.NS", "1mo").await.unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.close_at(1), None);
        assert_eq!(series.close_at(2), Some(102.0));
        assert_eq!(
            series.last_timestamp(),
            Utc.timestamp_opt(1714967100, 0).single()
        );

        let request = transport
            .requests()
            .into_iter()
            .find(|r| r.url.contains("/v8/finance/chart"))
            .unwrap();
        assert_eq!(request.query_param("interval"), Some("1d"));
        assert_eq!(request.query_param("range"), Some("1mo"));
    }

    #[tokio::test]
    async fn test_chart_without_bars_is_no_data() {
        let transport = Arc::new(ScriptedTransport::with_session_defaults().route(
            "/v8/finance/chart/",
            json(200, chart_body(&[], &[])),
        ));
        let client = client(transport);

        let err = client.daily_series("TCS.NS", "10d").await.unwrap_err();
        assert!(matches!(err, MarketDataError::NoData { .. }));
    }

    #[tokio::test]
    async fn test_crumb_omitted_without_session() {
        let transport = Arc::new(
            ScriptedTransport::with_session_defaults()
                .route("/v7/finance/quote", json(200, quote_body(1.0))),
        );
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let identity = Arc::new(ClientIdentity::new());
        let session = Arc::new(SessionManager::new(
            transport.clone(),
            identity.clone(),
            clock,
            &SessionConfig::default(),
            SessionEndpoints::default(),
        ));
        let fetcher = ResilientFetcher::new(transport.clone(), identity, Arc::new(RateGate::new(Duration::ZERO)));
        let client = YahooClient::new(fetcher, session, MarketConfig::default(), RetryPolicy::default());

        client.previous_close_from_quote("TCS.NS").await.unwrap();
        let request = transport
            .requests()
            .into_iter()
            .find(|r| r.url.contains("/v7/finance/quote"))
            .unwrap();
        assert_eq!(request.query_param("crumb"), None);
    }
}
