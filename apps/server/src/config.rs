use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use chrono::NaiveTime;
use chrono_tz::Tz;
use prevclose_market_data::ResolverConfig;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub resolver: ResolverConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable values fall back
    /// to the defaults, except the listen address.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let listen_addr: SocketAddr = lookup("PREVCLOSE_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3005".to_string())
            .parse()
            .context("Invalid PREVCLOSE_LISTEN_ADDR")?;
        let cors_allow = lookup("PREVCLOSE_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let defaults = ResolverConfig::default();
        let mut resolver = defaults.clone();

        resolver.cache.fresh_ttl = millis(&lookup, "FRESH_TTL_MS", defaults.cache.fresh_ttl);
        resolver.cache.stale_ttl = millis(&lookup, "STALE_TTL_MS", defaults.cache.stale_ttl);
        resolver.min_interval = millis(&lookup, "MIN_INTERVAL_MS", defaults.min_interval);
        resolver.retry.max_retries = lookup("MAX_RETRIES")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.retry.max_retries);
        resolver.retry.backoff_base = millis(&lookup, "BACKOFF_BASE_MS", defaults.retry.backoff_base);
        resolver.session.session_ttl = millis(&lookup, "SESSION_TTL_MS", defaults.session.session_ttl);
        resolver.session.warm_ttl = millis(&lookup, "WARM_TTL_MS", defaults.session.warm_ttl);
        resolver.request_timeout = millis(&lookup, "UPSTREAM_TIMEOUT_MS", defaults.request_timeout);

        if let Some(raw) = lookup("MARKET_CLOSE") {
            match NaiveTime::parse_from_str(raw.trim(), "%H:%M") {
                Ok(close) => resolver.market.close = close,
                Err(_) => tracing::warn!("Ignoring invalid MARKET_CLOSE '{}', expected HH:MM", raw),
            }
        }
        if let Some(raw) = lookup("MARKET_TZ") {
            match raw.trim().parse::<Tz>() {
                Ok(tz) => resolver.market.timezone = tz,
                Err(_) => tracing::warn!("Ignoring unknown MARKET_TZ '{}'", raw),
            }
        }
        if let Some(suffix) = lookup("EXCHANGE_SUFFIX").filter(|s| !s.trim().is_empty()) {
            resolver.market.exchange_suffix = suffix.trim().to_uppercase();
        }
        resolver.backup_api_key = lookup("BACKUP_API_KEY").filter(|s| !s.trim().is_empty());

        Ok(Self {
            listen_addr,
            cors_allow,
            resolver,
        })
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:3005".parse().unwrap());
        assert_eq!(config.cors_allow, vec!["*".to_string()]);
        assert_eq!(config.resolver.min_interval, Duration::from_secs(10));
        assert_eq!(config.resolver.market.exchange_suffix, ".NS");
        assert!(config.resolver.backup_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PREVCLOSE_LISTEN_ADDR", "127.0.0.1:8080"),
            ("PREVCLOSE_CORS_ALLOW_ORIGINS", "https://a.example, https://b.example"),
            ("FRESH_TTL_MS", "5000"),
            ("MAX_RETRIES", "2"),
            ("MARKET_CLOSE", "16:00"),
            ("MARKET_TZ", "America/New_York"),
            ("EXCHANGE_SUFFIX", ".bo"),
            ("BACKUP_API_KEY", "k"),
        ])
        .unwrap();
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.cors_allow.len(), 2);
        assert_eq!(config.resolver.cache.fresh_ttl, Duration::from_millis(5000));
        assert_eq!(config.resolver.retry.max_retries, 2);
        assert_eq!(config.resolver.market.close, NaiveTime::from_hms_opt(16, 0, 0).unwrap());
        assert_eq!(config.resolver.market.timezone, chrono_tz::America::New_York);
        assert_eq!(config.resolver.market.exchange_suffix, ".BO");
        assert_eq!(config.resolver.backup_api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config(&[
            ("STALE_TTL_MS", "ten minutes"),
            ("MARKET_CLOSE", "25:99"),
            ("MARKET_TZ", "Mars/Olympus"),
            ("BACKUP_API_KEY", "  "),
        ])
        .unwrap();
        assert_eq!(config.resolver.cache.stale_ttl, Duration::from_secs(600));
        assert_eq!(config.resolver.market.close, NaiveTime::from_hms_opt(15, 30, 0).unwrap());
        assert_eq!(config.resolver.market.timezone, chrono_tz::Asia::Kolkata);
        assert!(config.resolver.backup_api_key.is_none());
    }

    #[test]
    fn test_invalid_listen_addr_is_an_error() {
        assert!(config(&[("PREVCLOSE_LISTEN_ADDR", "nowhere")]).is_err());
    }
}
