//! HTTP fetch engine
//!
//! This module handles every network request of a job:
//! - Building the shared HTTP client and per-source header sets
//! - Politeness delay with jitter between requests of one source
//! - Bounded retries with exponential backoff for transport failures
//! - Classifying non-2xx responses and anti-bot challenge pages

use crate::adapters::{challenge_markers, source_headers, Request};
use crate::config::{FetchConfig, HeaderConfig, SourceConfig};
use crate::crawler::throttle::Throttle;
use crate::{ConfigError, FetchError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The request that produced this page
    pub request: Request,

    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value
    pub content_type: Option<String>,

    /// Page body content
    pub body: String,
}

/// Anything that can turn a request into a page
///
/// The pagination controller only talks to this trait, so jobs can be
/// driven by canned responses in tests.
#[async_trait]
pub trait PageFetcher: Send {
    /// Fetches one page, never running past `deadline`
    async fn fetch(&mut self, request: &Request, deadline: Instant)
        -> Result<FetchedPage, FetchError>;
}

/// Builds the HTTP client shared by every job
///
/// # Example
///
/// ```no_run
/// use promo_harvest::config::FetchConfig;
/// use promo_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Converts a header configuration into a header map
pub fn build_headers(config: &HeaderConfig) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();

    let named = [
        (USER_AGENT, &config.user_agent),
        (REFERER, &config.referer),
        (ACCEPT, &config.accept),
        (ACCEPT_LANGUAGE, &config.accept_language),
    ];
    for (name, value) in named {
        if let Some(value) = value {
            headers.insert(name.clone(), header_value(name.as_str(), value)?);
        }
    }

    for (name, value) in &config.extra {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::InvalidHeader(format!("invalid header name '{}'", name)))?;
        headers.insert(header, header_value(name, value)?);
    }

    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value)
        .map_err(|_| ConfigError::InvalidHeader(format!("invalid value for header '{}'", name)))
}

/// Outcome of one attempt, before the retry policy is applied
#[derive(Debug)]
enum AttemptError {
    /// Worth retrying: timeout or connection-level failure
    Transient { timeout: bool, message: String },

    /// Returned as is
    Fatal(FetchError),
}

impl AttemptError {
    fn into_fetch_error(self, attempts: u32) -> FetchError {
        match self {
            Self::Transient { timeout: true, .. } => FetchError::Timeout { attempts },
            Self::Transient { message, .. } => FetchError::Connection { attempts, message },
            Self::Fatal(e) => e,
        }
    }
}

fn classify(error: reqwest::Error) -> AttemptError {
    if error.is_redirect() || error.is_decode() || error.is_builder() {
        AttemptError::Fatal(FetchError::Transport(error.to_string()))
    } else if error.is_timeout() {
        AttemptError::Transient {
            timeout: true,
            message: error.to_string(),
        }
    } else if error.is_connect() || error.is_request() || error.is_body() {
        AttemptError::Transient {
            timeout: false,
            message: error.to_string(),
        }
    } else {
        AttemptError::Fatal(FetchError::Transport(error.to_string()))
    }
}

/// Fetch engine for one source
pub struct HttpFetcher {
    client: Client,
    headers: HeaderMap,
    markers: Vec<String>,
    request_timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
    throttle: Throttle,
}

impl HttpFetcher {
    pub fn new(
        client: Client,
        source: &SourceConfig,
        config: &FetchConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            headers: build_headers(&source_headers(source))?,
            markers: challenge_markers(source),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            throttle: Throttle::new(
                Duration::from_millis(config.request_delay_ms),
                Duration::from_millis(config.delay_jitter_ms),
            ),
        })
    }

    /// One request with its timeout clamped to the job deadline
    async fn attempt(&self, request: &Request, deadline: Instant) -> Result<FetchedPage, AttemptError> {
        let attempt_deadline = deadline.min(Instant::now() + self.request_timeout);

        let response = tokio::time::timeout_at(attempt_deadline, self.download(request)).await;
        let (status, final_url, content_type, body) = match response {
            Ok(result) => result?,
            Err(_) if Instant::now() >= deadline => {
                return Err(AttemptError::Fatal(FetchError::DeadlineExceeded))
            }
            Err(_) => {
                return Err(AttemptError::Transient {
                    timeout: true,
                    message: "request timed out".to_string(),
                })
            }
        };

        // A challenge page may come with 200 or 403/503; either way it is
        // not a listing.
        if let Some(marker) = self.find_marker(&body) {
            return Err(AttemptError::Fatal(FetchError::Challenge { status, marker }));
        }

        if !(200..300).contains(&status) {
            return Err(AttemptError::Fatal(FetchError::Status { status }));
        }

        Ok(FetchedPage {
            request: request.clone(),
            final_url,
            status,
            content_type,
            body,
        })
    }

    async fn download(
        &self,
        request: &Request,
    ) -> Result<(u16, Url, Option<String>, String), AttemptError> {
        let response = self
            .client
            .get(request.url.clone())
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.text().await.map_err(classify)?;

        Ok((status, final_url, content_type, body))
    }

    fn find_marker(&self, body: &str) -> Option<String> {
        let lowered = body.to_lowercase();
        self.markers
            .iter()
            .find(|marker| lowered.contains(marker.as_str()))
            .cloned()
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(
        &mut self,
        request: &Request,
        deadline: Instant,
    ) -> Result<FetchedPage, FetchError> {
        self.throttle.wait(deadline).await?;

        let mut attempt = 0;
        loop {
            let outcome = self.attempt(request, deadline).await;
            self.throttle.record_request();

            let error = match outcome {
                Ok(page) => return Ok(page),
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(e) if attempt >= self.max_retries => return Err(e.into_fetch_error(attempt + 1)),
                Err(e) => e,
            };

            let backoff = self.backoff(attempt);
            if Instant::now() + backoff >= deadline {
                return Err(FetchError::DeadlineExceeded);
            }

            tracing::warn!(
                "Attempt {} for {} failed ({:?}), retrying in {:?}",
                attempt + 1,
                request.url,
                error,
                backoff
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}
