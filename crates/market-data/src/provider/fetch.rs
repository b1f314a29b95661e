//! Retrying fetch client for upstream JSON endpoints.
//!
//! One call to [`ResilientFetcher::fetch`] targets a single host. Responses
//! are classified explicitly instead of relying on HTTP error handling:
//!
//! 1. `429`, `403`, `5xx` and transport failures are transient and retried
//!    with jittered exponential backoff, rotating the client identity on the
//!    first 429.
//! 2. An HTML page or a non-JSON body is an interstitial (consent or soft
//!    block). It ends the attempt immediately.
//! 3. Any other non-2xx status is terminal for the endpoint.
//! 4. A 2xx JSON payload whose result list is empty counts as a failure so
//!    the caller moves on to the next host.
//!
//! Every attempt, retries included, passes the shared [`RateGate`] first.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tracing::{debug, warn};

use super::identity::ClientIdentity;
use super::transport::{Transport, UpstreamRequest, UpstreamResponse};
use crate::config::RetryPolicy;
use crate::errors::{MarketDataError, RetryClass};
use crate::rate_gate::RateGate;

/// Envelopes whose `result` list must be non-empty for a payload to count.
const RESULT_ENVELOPES: &[&str] = &["quoteResponse", "quoteSummary", "chart"];

/// A physical upstream host serving the data endpoints.
#[derive(Clone, Debug)]
pub struct DataHost {
    /// Short label used in logs and errors, e.g. `query2`.
    pub label: &'static str,
    pub base_url: String,
}

impl DataHost {
    pub fn new(label: &'static str, base_url: impl Into<String>) -> Self {
        Self {
            label,
            base_url: base_url.into(),
        }
    }
}

/// Per-request retry and identity policy.
#[derive(Clone, Debug)]
pub struct FetchContext {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    pub backoff_base: Duration,
    /// Rotate the User-Agent on the first 429.
    pub rotate_identity_on_rate_limit: bool,
    /// Sent as the `Referer` header when set.
    pub referer: Option<String>,
}

impl FetchContext {
    pub fn from_policy(policy: &RetryPolicy) -> Self {
        Self {
            max_retries: policy.max_retries,
            backoff_base: policy.backoff_base,
            rotate_identity_on_rate_limit: true,
            referer: None,
        }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

pub struct ResilientFetcher {
    transport: Arc<dyn Transport>,
    identity: Arc<ClientIdentity>,
    gate: Arc<RateGate>,
}

impl ResilientFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        identity: Arc<ClientIdentity>,
        gate: Arc<RateGate>,
    ) -> Self {
        Self {
            transport,
            identity,
            gate,
        }
    }

    /// GET `host.base_url + path` and return the JSON payload.
    ///
    /// Returns `FetchFailed` carrying the last status once the retry budget
    /// is spent, or the classified error for non-retryable outcomes.
    pub async fn fetch(
        &self,
        host: &DataHost,
        path: &str,
        params: &[(String, String)],
        context: &FetchContext,
    ) -> Result<Value, MarketDataError> {
        let endpoint = format!("{}{}", host.label, path);
        let url = format!("{}{}", host.base_url, path);
        let mut attempt: u32 = 0;
        let mut rotated = false;

        loop {
            self.gate.acquire().await;

            let mut request = UpstreamRequest::get(url.clone()).user_agent(self.identity.user_agent());
            for (key, value) in params {
                request = request.query(key, value.clone());
            }
            if let Some(referer) = &context.referer {
                request = request.referer(referer.clone());
            }

            let outcome = match self.transport.send(request).await {
                Ok(response) => classify(&endpoint, &response),
                Err(e) => {
                    debug!("{} transport error: {}", endpoint, e);
                    Err(MarketDataError::Transient {
                        endpoint: endpoint.clone(),
                        status: None,
                    })
                }
            };

            let error = match outcome {
                Ok(payload) => return Ok(payload),
                Err(error) => error,
            };

            if error.retry_class() != RetryClass::WithBackoff {
                debug!("{} failed: {}", endpoint, error);
                return Err(error);
            }

            let status = match &error {
                MarketDataError::Transient { status, .. } => *status,
                _ => None,
            };

            if attempt >= context.max_retries {
                warn!(
                    "{} still failing after {} retries (status {:?})",
                    endpoint, attempt, status
                );
                return Err(MarketDataError::FetchFailed {
                    endpoint,
                    status,
                    message: format!("retry budget of {} exhausted", context.max_retries),
                });
            }

            attempt += 1;
            if status == Some(429) && !rotated && context.rotate_identity_on_rate_limit {
                self.identity.rotate();
                rotated = true;
            }

            let delay = backoff_delay(context.backoff_base, attempt, jitter_factor());
            debug!(
                "{} {:?}, retry {} in {:?}",
                endpoint, status, attempt, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Turn a raw response into a payload or a classified error.
pub fn classify(endpoint: &str, response: &UpstreamResponse) -> Result<Value, MarketDataError> {
    let status = response.status;

    if is_transient_status(status) {
        return Err(MarketDataError::Transient {
            endpoint: endpoint.to_string(),
            status: Some(status),
        });
    }

    if response.is_html() {
        return Err(MarketDataError::Interstitial {
            endpoint: endpoint.to_string(),
        });
    }

    if !response.is_success() {
        return Err(MarketDataError::FetchFailed {
            endpoint: endpoint.to_string(),
            status: Some(status),
            message: format!("Status {}", status),
        });
    }

    let payload: Value = serde_json::from_str(&response.body).map_err(|_| {
        MarketDataError::Interstitial {
            endpoint: endpoint.to_string(),
        }
    })?;

    if !payload.is_object() {
        return Err(MarketDataError::Interstitial {
            endpoint: endpoint.to_string(),
        });
    }

    if is_empty_payload(&payload) {
        return Err(MarketDataError::EmptyResult {
            endpoint: endpoint.to_string(),
        });
    }

    Ok(payload)
}

pub fn is_transient_status(status: u16) -> bool {
    status == 429 || status == 403 || (500..600).contains(&status)
}

/// True when a known envelope is present with a null or empty result list.
pub fn is_empty_payload(payload: &Value) -> bool {
    RESULT_ENVELOPES.iter().any(|envelope| {
        payload
            .get(envelope)
            .map(|inner| match inner.get("result") {
                Some(Value::Array(items)) => items.is_empty(),
                Some(Value::Null) | None => true,
                Some(_) => false,
            })
            .unwrap_or(false)
    })
}

/// `base * 2^(attempt-1) * jitter`, with `attempt` starting at 1.
pub fn backoff_delay(base: Duration, attempt: u32, jitter: f64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.mul_f64(f64::from(1u32 << exponent) * jitter)
}

fn jitter_factor() -> f64 {
    rand::thread_rng().gen_range(0.8..=1.2)
}
