//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while resolving a previous close.
///
/// Raw upstream responses are classified into one of these variants at the
/// point where they are first inspected (see `provider::fetch`). The enum is
/// `Clone` because a failed session bootstrap is shared by every caller that
/// was waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    /// The symbol or offset supplied by the caller is missing or malformed.
    /// No network call is made.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A 429, 403, 5xx or transport failure. Absorbed by the retry loop and
    /// never returned from the resolver.
    #[error("Transient upstream failure from {endpoint} (status {status:?})")]
    Transient {
        /// Endpoint label, e.g. `query2/quote`
        endpoint: String,
        /// Last HTTP status, `None` for transport errors
        status: Option<u16>,
    },

    /// The upstream served a consent or verification page instead of data.
    #[error("Interstitial page returned by {endpoint}")]
    Interstitial {
        /// Endpoint label
        endpoint: String,
    },

    /// A 2xx response whose result list was empty.
    #[error("Empty result from {endpoint}")]
    EmptyResult {
        /// Endpoint label
        endpoint: String,
    },

    /// Terminal failure for a single endpoint.
    #[error("Fetch failed for {endpoint} (status {status:?}): {message}")]
    FetchFailed {
        /// Endpoint label
        endpoint: String,
        /// Last observed HTTP status
        status: Option<u16>,
        /// Human readable detail
        message: String,
    },

    /// The requested offset is outside the available history.
    #[error("Insufficient history: requested {requested} days ago, {available} bars available")]
    InsufficientHistory {
        /// Requested trading-day offset
        requested: u32,
        /// Number of bars in the series
        available: usize,
    },

    /// The payload parsed but the value we need is missing or null.
    #[error("No data from {endpoint}: {message}")]
    NoData {
        /// Endpoint label
        endpoint: String,
        /// What was missing
        message: String,
    },

    /// The session bootstrap handshake failed.
    #[error("Session bootstrap failed: {message}")]
    Session {
        /// Underlying failure
        message: String,
    },

    /// The independent backup provider failed.
    #[error("Backup source failed: {message}")]
    Backup {
        /// Underlying failure
        message: String,
    },

    /// Every tier, the backup source and the stale cache were exhausted.
    #[error("Upstream error and backup failed for {symbol}")]
    UpstreamExhausted {
        /// Normalized symbol
        symbol: String,
    },
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// - [`RetryClass::Never`]: surface to the caller as-is
    /// - [`RetryClass::WithBackoff`]: retry the same endpoint after a delay
    /// - [`RetryClass::NextTier`]: give up on this endpoint, continue the fallback chain
    ///
    /// # Examples
    ///
    /// ```
    /// use prevclose_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::Transient { endpoint: "query2/quote".to_string(), status: Some(429) };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::Validation("Stock symbol is required".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Validation(_) | Self::UpstreamExhausted { .. } => RetryClass::Never,

            Self::Transient { .. } => RetryClass::WithBackoff,

            Self::Interstitial { .. }
            | Self::EmptyResult { .. }
            | Self::FetchFailed { .. }
            | Self::InsufficientHistory { .. }
            | Self::NoData { .. }
            | Self::Session { .. }
            | Self::Backup { .. } => RetryClass::NextTier,
        }
    }

    /// Whether this failure means the upstream no longer accepts our session.
    pub fn invalidates_session(&self) -> bool {
        match self {
            Self::Interstitial { .. } => true,
            Self::FetchFailed { status, .. } => matches!(status, Some(401) | Some(403)),
            _ => false,
        }
    }
}
