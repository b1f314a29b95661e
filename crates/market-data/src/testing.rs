//! Scripted upstream used by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::provider::{Transport, TransportError, UpstreamRequest, UpstreamResponse};

type Reply = Result<UpstreamResponse, TransportError>;

struct Route {
    pattern: String,
    replies: Mutex<VecDeque<Reply>>,
}

/// Transport that answers from canned replies keyed by URL substring.
///
/// The most recently added matching route wins. A route with several
/// replies hands them out in order and then keeps repeating the last one.
/// Unmatched requests get a plain-text 404.
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<UpstreamRequest>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Cookie seed, crumb and quote page answered the way a healthy upstream does.
    pub fn with_session_defaults() -> Self {
        Self::new()
            .route("fc.yahoo.com", text(404, "Not Found"))
            .route("/v1/test/getcrumb", text(200, "crumb123"))
            .route(
                "finance.yahoo.com/quote/",
                html(200, "https://finance.yahoo.com/quote/"),
            )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn route(self, pattern: &str, reply: Reply) -> Self {
        self.route_seq(pattern, vec![reply])
    }

    pub fn route_seq(self, pattern: &str, replies: Vec<Reply>) -> Self {
        self.routes.lock().unwrap().push(Route {
            pattern: pattern.to_string(),
            replies: Mutex::new(replies.into()),
        });
        self
    }

    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(pattern))
            .count()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let routes = self.routes.lock().unwrap();
        let Some(route) = routes
            .iter()
            .rev()
            .find(|route| request.url.contains(&route.pattern))
        else {
            return text(404, "Not Found");
        };

        let mut replies = route.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap_or_else(|| text(404, "Not Found"))
        }
    }
}

pub fn json(status: u16, body: Value) -> Reply {
    Ok(UpstreamResponse {
        status,
        content_type: Some("application/json;charset=utf-8".to_string()),
        final_url: String::new(),
        body: body.to_string(),
    })
}

pub fn html(status: u16, final_url: &str) -> Reply {
    Ok(UpstreamResponse {
        status,
        content_type: Some("text/html; charset=utf-8".to_string()),
        final_url: final_url.to_string(),
        body: "<!doctype html><html><body>Yahoo</body></html>".to_string(),
    })
}

pub fn text(status: u16, body: &str) -> Reply {
    Ok(UpstreamResponse {
        status,
        content_type: Some("text/plain".to_string()),
        final_url: String::new(),
        body: body.to_string(),
    })
}

pub fn unreachable() -> Reply {
    Err(TransportError {
        message: "connection reset".to_string(),
        timed_out: false,
    })
}

pub fn quote_body(previous_close: f64) -> Value {
    serde_json::json!({
        "quoteResponse": {
            "result": [{ "symbol": "TCS.NS", "regularMarketPreviousClose": previous_close }],
            "error": null
        }
    })
}

pub fn summary_body(previous_close: f64) -> Value {
    serde_json::json!({
        "quoteSummary": {
            "result": [{ "price": { "regularMarketPreviousClose": { "raw": previous_close, "fmt": "" } } }],
            "error": null
        }
    })
}

pub fn chart_body(timestamps: &[i64], closes: &[Option<f64>]) -> Value {
    serde_json::json!({
        "chart": {
            "result": [{
                "timestamp": timestamps,
                "indicators": { "quote": [{ "close": closes }] }
            }],
            "error": null
        }
    })
}

pub fn empty_body(envelope: &str) -> Value {
    serde_json::json!({ envelope: { "result": [], "error": null } })
}
