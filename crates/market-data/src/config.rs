//! Tunables for the resolution pipeline.
//!
//! Defaults mirror the production settings; the server overrides them from
//! the environment.

use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;

/// Default fresh window: 60s.
pub const DEFAULT_FRESH_TTL: Duration = Duration::from_secs(60);

/// Default stale window: 10 minutes.
pub const DEFAULT_STALE_TTL: Duration = Duration::from_secs(600);

/// Default spacing between upstream data calls.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(10);

/// Default retry budget per endpoint.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default base delay for exponential backoff.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Default session and warm-up lifetime: 30 minutes.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Default per-HTTP-call timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default reference timezone for trading-day math.
pub const DEFAULT_MARKET_TZ: Tz = chrono_tz::Asia::Kolkata;

/// Default exchange suffix appended to bare symbols.
pub const DEFAULT_EXCHANGE_SUFFIX: &str = ".NS";

/// Market close in the reference timezone (15:30).
pub fn default_market_close() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN)
}

/// Cache windows.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub fresh_ttl: Duration,
    pub stale_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_ttl: DEFAULT_FRESH_TTL,
            stale_ttl: DEFAULT_STALE_TTL,
        }
    }
}

/// Retry budget and backoff for a single endpoint.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each subsequent one.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

/// Session and warm-up lifetimes.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub session_ttl: Duration,
    pub warm_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL,
            warm_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

/// Market-close cutoff semantics.
#[derive(Clone, Debug)]
pub struct MarketConfig {
    pub close: NaiveTime,
    pub timezone: Tz,
    pub exchange_suffix: String,
    pub region: String,
    pub lang: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            close: default_market_close(),
            timezone: DEFAULT_MARKET_TZ,
            exchange_suffix: DEFAULT_EXCHANGE_SUFFIX.to_string(),
            region: "IN".to_string(),
            lang: "en-IN".to_string(),
        }
    }
}

/// Everything the pipeline can be tuned with.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    pub cache: CacheConfig,
    pub min_interval: Duration,
    pub retry: RetryPolicy,
    pub session: SessionConfig,
    pub market: MarketConfig,
    pub request_timeout: Duration,
    /// API key for the backup provider. The backup step is skipped without one.
    pub backup_api_key: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            min_interval: DEFAULT_MIN_INTERVAL,
            retry: RetryPolicy::default(),
            session: SessionConfig::default(),
            market: MarketConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            backup_api_key: None,
        }
    }
}
