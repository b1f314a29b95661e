use std::sync::Arc;

use anyhow::Context;
use prevclose_market_data::{PriceResolver, PriceResolverTrait};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub price_resolver: Arc<dyn PriceResolverTrait>,
}

pub fn init_tracing() {
    let log_format = std::env::var("PREVCLOSE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let resolver = PriceResolver::new(config.resolver.clone())
        .context("Failed to build the upstream HTTP client")?;

    tracing::info!(
        "Resolver ready (fresh {:?}, stale {:?}, min interval {:?}, close {} {})",
        config.resolver.cache.fresh_ttl,
        config.resolver.cache.stale_ttl,
        config.resolver.min_interval,
        config.resolver.market.close,
        config.resolver.market.timezone,
    );

    Ok(Arc::new(AppState {
        price_resolver: Arc::new(resolver),
    }))
}
