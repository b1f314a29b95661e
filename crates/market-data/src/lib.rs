//! Previous-close market data crate
//!
//! Resolves "closing price N trading days ago" for exchange-listed
//! instruments from an upstream that rate-limits, serves consent pages and
//! expires sessions without warning.
//!
//! # Overview
//!
//! The crate provides:
//! - A two-band (fresh/stale) result cache
//! - A process-wide rate gate for upstream data calls
//! - Session bootstrap, per-symbol warm-up and consent handling
//! - A retrying fetch client that classifies raw responses
//! - Trading-day index resolution with a market-close cutoff
//! - An explicit fallback state machine ending in a backup source
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! |  PriceResolver   | --> |   TieredCache    |  (fresh / stale bands)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |  SessionManager  | --> |    Transport     |  (cookie jar, consent)
//! +------------------+     +------------------+
//!          |                        ^
//!          v                        |
//! +------------------+     +------------------+
//! |   YahooClient    | --> | ResilientFetcher |  (classify, retry, gate)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! |   BackupSource   |  (last resort before the stale band)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`PriceResolver`] - The resolution pipeline
//! - [`PreviousClose`] - Resolved price with staleness and source
//! - [`ResolverConfig`] - Every tunable, with production defaults
//! - [`MarketDataError`] - Closed set of failure kinds

pub mod cache;
pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod rate_gate;
pub mod resolver;
pub mod session;

#[cfg(test)]
mod testing;

pub use cache::{CacheKey, Lookup, TieredCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, MarketConfig, ResolverConfig, RetryPolicy, SessionConfig};
pub use errors::{MarketDataError, RetryClass};
pub use models::{DailyBar, DailySeries, PreviousClose, PriceSource};
pub use provider::{BackupSource, HttpTransport, ScraperApiBackup, Transport, YahooClient};
pub use rate_gate::RateGate;
pub use resolver::{
    normalize_symbol, PriceResolver, PriceResolverTrait, ResolutionTrace, Stage,
};
pub use session::{SessionArtifacts, SessionManager};
