//! Trading-day offset to series index, with a market-close cutoff.
//!
//! The chart series includes the current session's bar once trading has
//! started. Until the market closes in the reference timezone that bar is
//! still moving, so every offset shifts back by one.

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::config::MarketConfig;
use crate::errors::MarketDataError;

/// Yahoo chart ranges with a conservative trading-day count for each.
const CHART_RANGES: &[(u32, &str)] = &[
    (20, "1mo"),
    (60, "3mo"),
    (120, "6mo"),
    (250, "1y"),
    (500, "2y"),
    (1250, "5y"),
    (2500, "10y"),
];

/// Market close in a fixed reference timezone.
#[derive(Clone, Debug, PartialEq)]
pub struct MarketCutoff {
    pub close: NaiveTime,
    pub timezone: Tz,
}

impl MarketCutoff {
    pub fn new(close: NaiveTime, timezone: Tz) -> Self {
        Self { close, timezone }
    }

    pub fn from_config(config: &MarketConfig) -> Self {
        Self::new(config.close, config.timezone)
    }

    /// True when `last_bar` falls on today's date in the reference timezone
    /// and the market has not closed yet.
    pub fn in_progress(&self, last_bar: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let now_local = now.with_timezone(&self.timezone);
        let bar_local = last_bar.with_timezone(&self.timezone);
        bar_local.date_naive() == now_local.date_naive() && now_local.time() < self.close
    }

    /// Index of the bar `days_ago` trading days back in a series of `len`
    /// bars whose newest bar is stamped `last_bar`.
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use prevclose_market_data::resolver::MarketCutoff;
    /// use prevclose_market_data::config::MarketConfig;
    ///
    /// let cutoff = MarketCutoff::from_config(&MarketConfig::default());
    /// // Bar opened 09:15 IST, asked at 14:00 IST the same day
    /// let last_bar = Utc.with_ymd_and_hms(2024, 5, 2, 3, 45, 0).unwrap();
    /// let now = Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap();
    /// assert_eq!(cutoff.resolve_index(5, last_bar, now, 0).unwrap(), 3);
    /// ```
    pub fn resolve_index(
        &self,
        len: usize,
        last_bar: DateTime<Utc>,
        now: DateTime<Utc>,
        days_ago: u32,
    ) -> Result<usize, MarketDataError> {
        let shift: i64 = if self.in_progress(last_bar, now) { 2 } else { 1 };
        let index = len as i64 - shift - i64::from(days_ago);

        if index < 0 || index >= len as i64 {
            return Err(MarketDataError::InsufficientHistory {
                requested: days_ago,
                available: len,
            });
        }

        Ok(index as usize)
    }
}

/// Smallest daily chart range expected to hold enough bars for `days_ago`.
///
/// `days_ago == 0` uses `10d`. Otherwise the range must cover the requested
/// bar plus the possibly in-progress one.
pub fn chart_range(days_ago: u32) -> &'static str {
    if days_ago == 0 {
        return "10d";
    }
    let needed = days_ago.saturating_add(2);
    CHART_RANGES
        .iter()
        .find(|(capacity, _)| *capacity >= needed)
        .map(|(_, range)| *range)
        .unwrap_or("max")
}
