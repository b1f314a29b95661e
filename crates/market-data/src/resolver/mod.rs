//! Previous-close resolution.
//!
//! - `symbol` - normalization and exchange suffixing
//! - `trading_day` - trading-day offset to series index with the market-close cutoff
//! - `trace` - per-resolution stage diagnostics
//! - `price_resolver` - the fallback state machine tying everything together

mod price_resolver;
mod symbol;
mod trace;
mod trading_day;

pub use price_resolver::{PriceResolver, PriceResolverTrait};
pub use symbol::{normalize_symbol, KNOWN_SUFFIXES};
pub use trace::{ResolutionTrace, Stage, StageOutcome, StageRecord};
pub use trading_day::{chart_range, MarketCutoff};
