//! Upstream session bootstrap, per-symbol warm-up and consent handling.
//!
//! The upstream only serves data reliably to clients that look like a
//! browser which has visited the site: a cookie seeded by a handshake
//! request, optionally a crumb token, and for some regions a per-symbol page
//! visit that may redirect through a consent form.
//!
//! [`SessionManager`] owns that state. The cookies themselves live in the
//! transport's cookie jar; the manager tracks when they were seeded and the
//! crumb obtained with them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};
use urlencoding::encode;

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::errors::MarketDataError;
use crate::provider::{ClientIdentity, Transport, UpstreamRequest, UpstreamResponse};

/// Hosts that serve the consent interstitial.
const CONSENT_HOSTS: &[&str] = &["guce.yahoo.com", "consent.yahoo.com"];

/// Page fragments that only appear on the consent form.
const CONSENT_BODY_MARKERS: &[&str] = &["consentUUID", "name=\"agree\""];

/// Crumbs are short opaque tokens; anything longer is an error page.
const MAX_CRUMB_LEN: usize = 64;

/// URLs used to establish and maintain a session.
#[derive(Clone, Debug)]
pub struct SessionEndpoints {
    /// Handshake that seeds the baseline cookies.
    pub seed_url: String,
    /// Returns a crumb for the seeded cookies.
    pub crumb_url: String,
    /// Base of the per-symbol quote page used for warm-up.
    pub page_base_url: String,
    /// Consent acknowledgment form target.
    pub consent_url: String,
}

impl Default for SessionEndpoints {
    fn default() -> Self {
        Self {
            seed_url: "https://fc.yahoo.com".to_string(),
            crumb_url: "https://query1.finance.yahoo.com/v1/test/getcrumb".to_string(),
            page_base_url: "https://finance.yahoo.com".to_string(),
            consent_url: "https://guce.yahoo.com/consent".to_string(),
        }
    }
}

/// Authentication artifacts obtained during bootstrap.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionArtifacts {
    pub crumb: Option<String>,
}

#[derive(Clone, Debug)]
struct SessionState {
    established_at: DateTime<Utc>,
    artifacts: SessionArtifacts,
}

type Refresh = Shared<BoxFuture<'static, Result<SessionArtifacts, MarketDataError>>>;

#[derive(Default)]
struct SessionSlot {
    current: Option<SessionState>,
    /// The bootstrap every concurrent caller is waiting on, tagged with a
    /// generation so only that bootstrap's completion updates the slot.
    in_flight: Option<(u64, Refresh)>,
    generation: u64,
}

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    identity: Arc<ClientIdentity>,
    clock: Arc<dyn Clock>,
    endpoints: SessionEndpoints,
    session_ttl: Duration,
    warm_ttl: Duration,
    slot: Mutex<SessionSlot>,
    warmed: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        identity: Arc<ClientIdentity>,
        clock: Arc<dyn Clock>,
        config: &SessionConfig,
        endpoints: SessionEndpoints,
    ) -> Self {
        Self {
            transport,
            identity,
            clock,
            endpoints,
            session_ttl: Duration::from_std(config.session_ttl).unwrap_or(Duration::MAX),
            warm_ttl: Duration::from_std(config.warm_ttl).unwrap_or(Duration::MAX),
            slot: Mutex::new(SessionSlot::default()),
            warmed: Mutex::new(HashMap::new()),
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, SessionSlot> {
        self.slot.lock().unwrap_or_else(|poisoned| {
            warn!("Session mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_warmed(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.warmed.lock().unwrap_or_else(|poisoned| {
            warn!("Warm-state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Artifacts of the current session, if it is still valid.
    pub fn current(&self) -> Option<SessionArtifacts> {
        let slot = self.lock_slot();
        slot.current
            .as_ref()
            .filter(|state| self.clock.now() - state.established_at < self.session_ttl)
            .map(|state| state.artifacts.clone())
    }

    /// Make sure a session younger than the session TTL exists.
    ///
    /// Concurrent callers that find the session expired share a single
    /// bootstrap. If it fails, every one of them gets the error and the next
    /// call starts a fresh bootstrap.
    pub async fn ensure_session(&self) -> Result<SessionArtifacts, MarketDataError> {
        let (generation, refresh) = {
            let mut slot = self.lock_slot();

            if let Some(state) = &slot.current {
                if self.clock.now() - state.established_at < self.session_ttl {
                    return Ok(state.artifacts.clone());
                }
            }

            match &slot.in_flight {
                Some((generation, refresh)) => (*generation, refresh.clone()),
                None => {
                    slot.generation += 1;
                    let generation = slot.generation;
                    let refresh = bootstrap(
                        self.transport.clone(),
                        self.identity.clone(),
                        self.endpoints.clone(),
                    )
                    .boxed()
                    .shared();
                    slot.in_flight = Some((generation, refresh.clone()));
                    (generation, refresh)
                }
            }
        };

        let result = refresh.await;

        let mut slot = self.lock_slot();
        if matches!(&slot.in_flight, Some((g, _)) if *g == generation) {
            slot.in_flight = None;
            match &result {
                Ok(artifacts) => {
                    slot.current = Some(SessionState {
                        established_at: self.clock.now(),
                        artifacts: artifacts.clone(),
                    });
                    info!(
                        "Upstream session established (crumb: {})",
                        artifacts.crumb.is_some()
                    );
                }
                Err(e) => warn!("Upstream session bootstrap failed: {}", e),
            }
        }

        result
    }

    /// Whether `symbol` was warmed within the warm TTL.
    pub fn is_warm(&self, symbol: &str) -> bool {
        let now = self.clock.now();
        self.lock_warmed()
            .get(symbol)
            .is_some_and(|warmed_at| now - *warmed_at < self.warm_ttl)
    }

    /// Visit the symbol's quote page so the upstream serves data for it,
    /// completing the consent flow when the visit lands on it.
    pub async fn warm(&self, symbol: &str) -> Result<(), MarketDataError> {
        if self.is_warm(symbol) {
            return Ok(());
        }

        self.ensure_session().await?;

        let request = UpstreamRequest::get(format!(
            "{}/quote/{}",
            self.endpoints.page_base_url,
            encode(symbol)
        ))
        .query("guccounter", "1")
        .user_agent(self.identity.user_agent());

        let response = self.transport.send(request).await.map_err(|e| {
            MarketDataError::Session {
                message: format!("warm-up visit for {} failed: {}", symbol, e),
            }
        })?;

        if requires_consent(&response) {
            info!("Handling consent for {}", symbol);
            self.acknowledge_consent().await?;
        } else if !response.is_success() {
            return Err(MarketDataError::Session {
                message: format!("warm-up visit for {} returned status {}", symbol, response.status),
            });
        }

        self.lock_warmed().insert(symbol.to_string(), self.clock.now());
        debug!("Warmed symbol {}", symbol);
        Ok(())
    }

    async fn acknowledge_consent(&self) -> Result<(), MarketDataError> {
        let request = UpstreamRequest::post_form(self.endpoints.consent_url.clone())
            .form_field("agree", "agree")
            .form_field("consentUUID", "default")
            .form_field("sessionId", "default")
            .user_agent(self.identity.user_agent());

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| MarketDataError::Session {
                message: format!("consent acknowledgment failed: {}", e),
            })?;

        if response.status >= 400 {
            return Err(MarketDataError::Session {
                message: format!("consent acknowledgment returned status {}", response.status),
            });
        }
        Ok(())
    }

    /// Drop the session and every warm record so the next call starts over.
    ///
    /// A bootstrap already in flight is kept: it seeds fresh cookies, so
    /// later callers join it instead of starting a second one.
    pub fn invalidate(&self) {
        let mut slot = self.lock_slot();
        if slot.current.take().is_some() {
            info!("Upstream session invalidated");
        }
        drop(slot);

        self.lock_warmed().clear();
    }
}

/// Seed cookies, then try to obtain a crumb for them.
async fn bootstrap(
    transport: Arc<dyn Transport>,
    identity: Arc<ClientIdentity>,
    endpoints: SessionEndpoints,
) -> Result<SessionArtifacts, MarketDataError> {
    // Any status is fine here: the handshake exists for its Set-Cookie headers.
    let seed = UpstreamRequest::get(endpoints.seed_url.clone()).user_agent(identity.user_agent());
    let response = transport
        .send(seed)
        .await
        .map_err(|e| MarketDataError::Session {
            message: format!("cookie handshake failed: {}", e),
        })?;
    debug!("Session handshake returned status {}", response.status);

    let crumb_request =
        UpstreamRequest::get(endpoints.crumb_url.clone()).user_agent(identity.user_agent());
    let crumb = match transport.send(crumb_request).await {
        Ok(response) => parse_crumb(&response),
        Err(e) => {
            debug!("Crumb request failed, continuing without one: {}", e);
            None
        }
    };

    Ok(SessionArtifacts { crumb })
}

fn parse_crumb(response: &UpstreamResponse) -> Option<String> {
    if !response.is_success() || response.is_html() {
        return None;
    }
    let crumb = response.body.trim();
    if crumb.is_empty()
        || crumb.len() > MAX_CRUMB_LEN
        || crumb.contains(char::is_whitespace)
        || crumb.contains('<')
    {
        return None;
    }
    Some(crumb.to_string())
}

/// Whether a page visit landed on the consent interstitial.
pub fn requires_consent(response: &UpstreamResponse) -> bool {
    CONSENT_HOSTS
        .iter()
        .any(|host| response.final_url.contains(host))
        || CONSENT_BODY_MARKERS
            .iter()
            .any(|marker| response.body.contains(marker))
}
