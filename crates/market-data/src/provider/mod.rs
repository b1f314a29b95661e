//! Upstream access: transport, client identity, resilient fetch and the
//! concrete data sources.
//!
//! # Layers
//!
//! - `transport` - raw HTTP behind the [`Transport`] trait
//! - `identity` - User-Agent pool shared by every outbound request
//! - `fetch` - response classification, retry with backoff, rate gating
//! - `yahoo` - quote, quoteSummary and chart endpoints with host fallback
//! - `backup` - independent last-resort source

mod fetch;
mod identity;
mod transport;

pub mod backup;
pub mod yahoo;

// Re-exports
pub use backup::{BackupSource, ScraperApiBackup};
pub use fetch::{
    backoff_delay, classify, is_empty_payload, is_transient_status, DataHost, FetchContext,
    ResilientFetcher,
};
pub use identity::{ClientIdentity, USER_AGENTS};
pub use transport::{HttpTransport, Method, Transport, TransportError, UpstreamRequest, UpstreamResponse};
pub use yahoo::YahooClient;
