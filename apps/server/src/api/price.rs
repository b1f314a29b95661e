use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use prevclose_market_data::{PreviousClose, PriceSource};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceQuery {
    symbol: Option<String>,
    days_ago: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub previous_close: Decimal,
    pub stale: bool,
    pub used_backup: bool,
    pub source: PriceSource,
}

impl From<PreviousClose> for PriceResponse {
    fn from(close: PreviousClose) -> Self {
        Self {
            used_backup: close.used_backup(),
            previous_close: close.price,
            stale: close.stale,
            source: close.source,
        }
    }
}

/// Closing price `daysAgo` trading days back (default 0).
async fn get_previous_close(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PriceQuery>,
) -> ApiResult<Json<PriceResponse>> {
    let days_ago = parse_days_ago(query.days_ago.as_deref())?;
    let symbol = query.symbol.unwrap_or_default();

    let close = state
        .price_resolver
        .resolve_previous_close(&symbol, days_ago)
        .await?;
    Ok(Json(close.into()))
}

fn parse_days_ago(raw: Option<&str>) -> ApiResult<u32> {
    match raw.map(str::trim) {
        None | Some("") => Ok(0),
        Some(value) => value.parse::<u32>().map_err(|_| {
            ApiError::BadRequest(format!(
                "daysAgo must be a non-negative integer, got '{}'",
                value
            ))
        }),
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/price", get(get_previous_close))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_days_ago() {
        assert_eq!(parse_days_ago(None).unwrap(), 0);
        assert_eq!(parse_days_ago(Some("")).unwrap(), 0);
        assert_eq!(parse_days_ago(Some(" 3 ")).unwrap(), 3);
        assert!(parse_days_ago(Some("-1")).is_err());
        assert!(parse_days_ago(Some("abc")).is_err());
        assert!(parse_days_ago(Some("1.5")).is_err());
    }
}
