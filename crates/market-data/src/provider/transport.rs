//! HTTP seam between the pipeline and the network.
//!
//! Everything that talks to an upstream goes through [`Transport`], which
//! returns the raw status, content type, final URL and body without
//! interpreting them. Classification happens one layer up in
//! [`fetch`](super::fetch), so the whole fallback chain can be exercised with
//! a scripted transport in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, redirect};
use thiserror::Error;

/// Upper bound on redirects followed for a single request.
const MAX_REDIRECTS: usize = 5;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    /// POST with an `application/x-www-form-urlencoded` body.
    PostForm,
}

/// A request to an upstream host.
#[derive(Clone, Debug)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            form: Vec::new(),
            user_agent: None,
            referer: None,
        }
    }

    pub fn post_form(url: impl Into<String>) -> Self {
        Self {
            method: Method::PostForm,
            ..Self::get(url)
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn form_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.form.push((key.to_string(), value.into()));
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Value of a query parameter, if set.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// An upstream response, uninterpreted.
#[derive(Clone, Debug)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// URL after following redirects.
    pub final_url: String,
    pub body: String,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    }
}

/// The request never produced a response (DNS, connect, TLS, timeout).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            timed_out: e.is_timeout(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError>;
}

/// reqwest-backed transport with a shared cookie jar.
///
/// All upstream hosts share one client so cookies set during the session
/// handshake and consent flow are replayed on data requests.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json,text/plain,*/*"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .timeout(timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::PostForm => self.client.post(&request.url).form(&request.form),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(user_agent) = &request.user_agent {
            builder = builder.header(header::USER_AGENT, user_agent);
        }
        if let Some(referer) = &request.referer {
            builder = builder.header(header::REFERER, referer);
        }

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;

        Ok(UpstreamResponse {
            status,
            content_type,
            final_url,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = UpstreamRequest::get("https://query2.finance.yahoo.com/v7/finance/quote")
            .query("symbols", "TCS.NS")
            .query("region", "IN")
            .user_agent("UA")
            .referer("https://finance.yahoo.com/quote/TCS.NS/");

        assert_eq!(request.method, Method::Get);
        assert_eq!(request.query_param("symbols"), Some("TCS.NS"));
        assert_eq!(request.query_param("crumb"), None);
        assert_eq!(request.user_agent.as_deref(), Some("UA"));
    }

    #[test]
    fn test_post_form() {
        let request = UpstreamRequest::post_form("https://guce.yahoo.com/consent")
            .form_field("agree", "agree");
        assert_eq!(request.method, Method::PostForm);
        assert_eq!(request.form, vec![("agree".to_string(), "agree".to_string())]);
    }

    #[test]
    fn test_response_html_detection() {
        let response = UpstreamResponse {
            status: 200,
            content_type: Some("Text/HTML; charset=utf-8".to_string()),
            final_url: "https://guce.yahoo.com/consent".to_string(),
            body: "<html></html>".to_string(),
        };
        assert!(response.is_html());
        assert!(response.is_success());

        let response = UpstreamResponse {
            content_type: Some("application/json".to_string()),
            status: 503,
            ..response
        };
        assert!(!response.is_html());
        assert!(!response.is_success());
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(Duration::from_secs(15)).is_ok());
    }
}
