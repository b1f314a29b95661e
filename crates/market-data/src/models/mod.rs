//! Market data models
//!
//! - `price` - The resolved previous close and where it came from
//! - `series` - Daily bars returned by the chart endpoint

mod price;
mod series;

pub use price::{PreviousClose, PriceSource};
pub use series::{DailyBar, DailySeries};
