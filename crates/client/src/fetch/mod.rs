//! Network access for the caching agent.
//!
//! ### The `Network` seam
//! The agent never talks to reqwest directly; it goes through [`Network`], so
//! tests can count calls and script failures.
//!
//! ### Response classification
//! - Same-origin responses are `basic`, cross-origin ones `cors`.
//! - A cross-origin `no-cors` request yields an `opaque` snapshot (status 0,
//!   empty body), the way a browser filters it.
//! - Non-2xx statuses are responses, not errors. Only transport failures
//!   (DNS, connect, TLS, timeout) become [`Error::Network`].
//!
//! ### Limits
//! - Max redirects: 5
//! - Timeout: configurable; the agent adds none of its own
//! - No body size cap: responses come back whole. The agent decides what is
//!   too large to store.

pub mod url;

use ::url::Url;
use appshell_core::{AppConfig, Error, Method, RequestMode, ResourceRequest, ResponseKind, ResponseSnapshot};
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, parse_request_url, resolve, same_origin};

/// Something that can perform a resource request.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &ResourceRequest) -> Result<ResponseSnapshot, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "appshell/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Origin of the application; decides basic/cors/opaque classification.
    pub app_origin: Option<Url>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "appshell/0.1".to_string(),
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            app_origin: None,
        }
    }
}

impl FetchConfig {
    /// Derive fetch settings from the agent configuration.
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            app_origin: config.base().ok(),
            ..Default::default()
        }
    }

    fn is_cross_origin(&self, url: &Url) -> bool {
        self.app_origin.as_ref().is_some_and(|origin| !same_origin(origin, url))
    }
}

/// reqwest-backed [`Network`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    fn classify(&self, request: &ResourceRequest) -> Result<ResponseKind, Error> {
        if !self.config.is_cross_origin(&request.url) {
            return Ok(ResponseKind::Basic);
        }
        match request.mode {
            RequestMode::SameOrigin => {
                Err(Error::Network(format!("cross-origin request in same-origin mode: {}", request.url)))
            }
            RequestMode::NoCors => Ok(ResponseKind::Opaque),
            RequestMode::Cors | RequestMode::Navigate => Ok(ResponseKind::Cors),
        }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Patch => reqwest::Method::PATCH,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

#[async_trait::async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &ResourceRequest) -> Result<ResponseSnapshot, Error> {
        let start = Instant::now();
        let kind = self.classify(request)?;

        let mut builder = self.http.request(to_reqwest_method(request.method), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Network(format!("timed out: {}", request.url))
            } else {
                Error::Network(format!("network error: {}", e))
            }
        })?;

        if kind == ResponseKind::Opaque {
            tracing::debug!(url = %request.url, "cross-origin no-cors response is opaque");
            return Ok(ResponseSnapshot::opaque(response.url().as_str()));
        }

        let status = response.status();

        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect::<Vec<_>>();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network fetch complete"
        );

        Ok(ResponseSnapshot {
            url: final_url,
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            kind,
            headers,
            body: bytes,
        })
    }
}

/// Content-Type of a snapshot, if present.
pub fn content_type(snapshot: &ResponseSnapshot) -> Option<&str> {
    snapshot.header(header::CONTENT_TYPE.as_str())
}
