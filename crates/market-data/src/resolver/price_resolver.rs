//! Previous-close resolution.
//!
//! ```text
//! CacheCheck ──fresh──────────────────────────────────────────────▶ Done
//!     │ miss
//!     ▼
//! SessionEnsure ─▶ Warm ─▶ Quote ─▶ QuoteSummary ─▶ Chart ──ok────▶ Done
//!     │ fail         │ fail                           │ all failed
//!     └──────────────┴────────────────────────────────▼
//!                                                   Backup ──ok───▶ Done
//!                                                     │ fail
//!                                                     ▼
//!                                                 StaleCheck ──hit─▶ Done (stale)
//!                                                     │ miss
//!                                                     ▼
//!                                             UpstreamExhausted
//! ```
//!
//! Quote and QuoteSummary only answer the latest previous close, so for
//! `days_ago > 0` only the chart tier runs. Every tier tries the primary
//! host and then the secondary host before the next tier starts.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::symbol::normalize_symbol;
use super::trace::{ResolutionTrace, Stage};
use super::trading_day::{chart_range, MarketCutoff};
use crate::cache::{CacheKey, Lookup, TieredCache};
use crate::clock::{Clock, SystemClock};
use crate::config::ResolverConfig;
use crate::errors::MarketDataError;
use crate::models::{PreviousClose, PriceSource};
use crate::provider::{
    BackupSource, ClientIdentity, HttpTransport, ResilientFetcher, ScraperApiBackup, Transport,
    TransportError, YahooClient,
};
use crate::rate_gate::RateGate;
use crate::session::{SessionEndpoints, SessionManager};

/// Tiers in fallback order.
const TIERS: [PriceSource; 3] = [PriceSource::Quote, PriceSource::QuoteSummary, PriceSource::Chart];

/// Resolves "closing price N trading days ago".
#[async_trait]
pub trait PriceResolverTrait: Send + Sync {
    async fn resolve_previous_close(
        &self,
        symbol: &str,
        days_ago: u32,
    ) -> Result<PreviousClose, MarketDataError>;
}

/// The resolution pipeline: cache, session, tiered upstream, backup, stale.
pub struct PriceResolver {
    cache: TieredCache<PreviousClose>,
    yahoo: YahooClient,
    backup: Option<Arc<dyn BackupSource>>,
    clock: Arc<dyn Clock>,
    cutoff: MarketCutoff,
    exchange_suffix: String,
}

impl PriceResolver {
    /// Production wiring: reqwest transport, system clock, and the
    /// ScraperAPI backup when an API key is configured.
    pub fn new(config: ResolverConfig) -> Result<Self, TransportError> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.request_timeout)?);

        let backup = config
            .backup_api_key
            .as_ref()
            .filter(|key| !key.trim().is_empty())
            .map(|key| {
                Arc::new(ScraperApiBackup::new(transport.clone(), key.trim().to_string()))
                    as Arc<dyn BackupSource>
            });
        if backup.is_none() {
            info!("No backup API key configured, backup source disabled");
        }

        Ok(Self::from_parts(config, transport, Arc::new(SystemClock), backup))
    }

    pub fn from_parts(
        config: ResolverConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        backup: Option<Arc<dyn BackupSource>>,
    ) -> Self {
        let identity = Arc::new(ClientIdentity::new());
        let gate = Arc::new(RateGate::new(config.min_interval));
        let session = Arc::new(SessionManager::new(
            transport.clone(),
            identity.clone(),
            clock.clone(),
            &config.session,
            SessionEndpoints::default(),
        ));
        let fetcher = ResilientFetcher::new(transport, identity, gate);
        let yahoo = YahooClient::new(fetcher, session, config.market.clone(), config.retry.clone());

        Self {
            cache: TieredCache::new(&config.cache, clock.clone()),
            yahoo,
            backup,
            cutoff: MarketCutoff::from_config(&config.market),
            exchange_suffix: config.market.exchange_suffix.clone(),
            clock,
        }
    }

    /// Resolve and also return the stages the resolution went through.
    pub async fn resolve_with_trace(
        &self,
        symbol: &str,
        days_ago: u32,
    ) -> (Result<PreviousClose, MarketDataError>, ResolutionTrace) {
        let mut trace = ResolutionTrace::new();
        let result = self.resolve(symbol, days_ago, &mut trace).await;
        debug!("Resolution of {} ({}d): {}", symbol, days_ago, trace.summary());
        (result, trace)
    }

    async fn resolve(
        &self,
        symbol: &str,
        days_ago: u32,
        trace: &mut ResolutionTrace,
    ) -> Result<PreviousClose, MarketDataError> {
        let symbol = normalize_symbol(symbol, &self.exchange_suffix)?;
        let key = CacheKey::previous_close(&symbol, days_ago);

        if let Some(cached) = self.cache.get_fresh(&key) {
            trace.record_success(Stage::CacheCheck);
            return Ok(PreviousClose::fresh(cached.price, PriceSource::Cache));
        }
        trace.record_skip(Stage::CacheCheck, "miss");

        let resolved = match self.fetch_upstream(&symbol, days_ago, trace).await {
            Some(close) => Some(close),
            None => self.fetch_backup(&symbol, days_ago, trace).await,
        };

        if let Some(close) = resolved {
            self.cache.put(key, close.clone());
            debug!(
                "Resolved {} ({}d) = {} from {}",
                symbol, days_ago, close.price, close.source
            );
            return Ok(close);
        }

        match self.cache.lookup(&key) {
            // Another resolution refreshed the entry meanwhile
            Lookup::Fresh(cached) => {
                trace.record_success(Stage::StaleCheck);
                Ok(PreviousClose::fresh(cached.price, PriceSource::Cache))
            }
            Lookup::Stale(cached) => {
                trace.record_success(Stage::StaleCheck);
                warn!("Upstream failed for {}, serving stale value", symbol);
                Ok(PreviousClose {
                    price: cached.price,
                    stale: true,
                    source: cached.source,
                })
            }
            Lookup::Absent => {
                trace.record_skip(Stage::StaleCheck, "no entry within stale window");
                warn!("All sources failed for {} ({}d): {}", symbol, days_ago, trace.summary());
                Err(MarketDataError::UpstreamExhausted { symbol })
            }
        }
    }

    /// Run the tiers in order. `None` when the session could not be prepared
    /// or every applicable tier failed.
    async fn fetch_upstream(
        &self,
        symbol: &str,
        days_ago: u32,
        trace: &mut ResolutionTrace,
    ) -> Option<PreviousClose> {
        if !self.prepare(symbol, trace).await {
            return None;
        }

        for source in TIERS {
            let stage = Stage::Tier(source);
            if days_ago > 0 && source != PriceSource::Chart {
                trace.record_skip(stage, "latest previous close only");
                continue;
            }

            // An earlier tier may have invalidated the session
            if self.yahoo.session().current().is_none() && !self.prepare(symbol, trace).await {
                return None;
            }

            let value = match source {
                PriceSource::Quote => self.yahoo.previous_close_from_quote(symbol).await,
                PriceSource::QuoteSummary => self.yahoo.previous_close_from_summary(symbol).await,
                _ => self.close_from_chart(symbol, days_ago).await,
            };

            match value.and_then(|v| to_price(v, source.as_str())) {
                Ok(price) => {
                    trace.record_success(stage);
                    return Some(PreviousClose::fresh(price, source));
                }
                Err(e) => {
                    warn!("{} tier failed for {}: {}", source, symbol, e);
                    trace.record_error(stage, &e);
                }
            }
        }

        None
    }

    /// Ensure the session and warm the symbol.
    async fn prepare(&self, symbol: &str, trace: &mut ResolutionTrace) -> bool {
        let session = self.yahoo.session();

        if let Err(e) = session.ensure_session().await {
            warn!("Skipping upstream tiers for {}: {}", symbol, e);
            trace.record_error(Stage::SessionEnsure, &e);
            return false;
        }
        trace.record_success(Stage::SessionEnsure);

        if let Err(e) = session.warm(symbol).await {
            warn!("Skipping upstream tiers for {}: {}", symbol, e);
            trace.record_error(Stage::Warm, &e);
            return false;
        }
        trace.record_success(Stage::Warm);
        true
    }

    async fn close_from_chart(&self, symbol: &str, days_ago: u32) -> Result<f64, MarketDataError> {
        let series = self.yahoo.daily_series(symbol, chart_range(days_ago)).await?;
        let last_bar = series.last_timestamp().ok_or_else(|| MarketDataError::NoData {
            endpoint: PriceSource::Chart.as_str().to_string(),
            message: "no daily bars".to_string(),
        })?;

        let index = self
            .cutoff
            .resolve_index(series.len(), last_bar, self.clock.now(), days_ago)?;

        series.close_at(index).ok_or_else(|| MarketDataError::NoData {
            endpoint: PriceSource::Chart.as_str().to_string(),
            message: format!("null close at index {} of {}", index, series.len()),
        })
    }

    async fn fetch_backup(
        &self,
        symbol: &str,
        days_ago: u32,
        trace: &mut ResolutionTrace,
    ) -> Option<PreviousClose> {
        let Some(backup) = &self.backup else {
            trace.record_skip(Stage::Backup, "not configured");
            return None;
        };

        let result = backup
            .previous_close(symbol, days_ago)
            .await
            .and_then(|v| to_price(v, backup.id()));

        match result {
            Ok(price) => {
                info!("Resolved {} from backup source {}", symbol, backup.id());
                trace.record_success(Stage::Backup);
                Some(PreviousClose::fresh(price, PriceSource::Backup))
            }
            Err(e) => {
                warn!("Backup source {} failed for {}: {}", backup.id(), symbol, e);
                trace.record_error(Stage::Backup, &e);
                None
            }
        }
    }
}

#[async_trait]
impl PriceResolverTrait for PriceResolver {
    async fn resolve_previous_close(
        &self,
        symbol: &str,
        days_ago: u32,
    ) -> Result<PreviousClose, MarketDataError> {
        self.resolve_with_trace(symbol, days_ago).await.0
    }
}

/// Positive, finite prices only.
fn to_price(value: f64, endpoint: &str) -> Result<Decimal, MarketDataError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(MarketDataError::NoData {
            endpoint: endpoint.to_string(),
            message: format!("invalid price {}", value),
        });
    }
    Decimal::from_f64(value).ok_or_else(|| MarketDataError::NoData {
        endpoint: endpoint.to_string(),
        message: format!("unrepresentable price {}", value),
    })
}
