use chrono::{DateTime, Utc};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState,
    state::NotKeyed,
};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;

use super::config::ScanConfig;
use super::error::{Result, ScanError};
use super::traits::ScanSource;

const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_SECS: u64 = 60;

type Governor = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// How transient failures are retried.
///
/// Transient means HTTP 429, any 5xx, or a network-level failure (connect error,
/// timeout, truncated body). Everything else is returned to the caller on the first
/// attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `max_retries + 1` requests at most.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Use the server's `Retry-After` value instead of the computed backoff.
    pub respects_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_secs(MAX_BACKOFF_SECS),
            respects_retry_after: true,
        }
    }

    /// Exponential backoff with jitter: `initial × 2^retry ± 10%`, capped at
    /// `max_backoff`.
    ///
    /// # Arguments
    ///
    /// * `retry` - The retry attempt number (0-indexed, so first retry is 0)
    pub fn backoff(&self, retry: u32) -> Duration {
        let base_ms = self.initial_backoff.as_millis() as f64 * 2_f64.powi(retry.min(16) as i32);
        let jitter = base_ms * 0.2 * (fastrand::f64() - 0.5);
        let ms = (base_ms + jitter).max(0.0) as u64;
        Duration::from_millis(ms).min(self.max_backoff)
    }

    /// Delay before retry number `retry`, honoring a server-provided `Retry-After`.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(wait) if self.respects_retry_after => wait,
            _ => self.backoff(retry),
        }
    }
}

/// Parses a `Retry-After` value: delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        (at.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}

/// The single HTTP choke point for a scan run.
///
/// Every request from every worker goes through one token bucket whose refill period is
/// the configured `request_rate`, with a burst of one:
///
/// ```text
/// worker 1 ─┐
/// worker 2 ─┼─▶ [ governor: 1 token / request_rate ] ─▶ sec.gov
/// worker 3 ─┘
/// ```
///
/// Clones share the limiter and the retry counter, so handing a clone to each worker
/// never raises the effective request rate.
#[derive(Debug, Clone)]
pub struct SecClient {
    /// HTTP client carrying the contact `User-Agent`.
    pub(crate) client: reqwest::Client,

    /// Token bucket shared by every clone.
    pub(crate) rate_limiter: Arc<Governor>,

    pub(crate) retry: RetryPolicy,

    /// Retries performed by any clone since construction.
    pub(crate) retries: Arc<AtomicU64>,

    /// Base URL for EDGAR archives.
    pub(crate) archives_url: String,

    /// Base URL for the EDGAR data API.
    pub(crate) data_url: String,

    /// Full URL of `company_tickers.json`.
    pub(crate) tickers_url: String,
}

impl SecClient {
    /// Builds a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// `ScanError::Configuration` if the contact identity is not a valid header value,
    /// the request interval is zero or out of range, or the HTTP client cannot be built.
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(config.contact_identity.trim()).map_err(|e| {
                ScanError::Configuration(format!("Invalid contact identity: {}", e))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                ScanError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        let quota = Quota::with_period(config.request_interval()?)
            .ok_or_else(|| {
                ScanError::Configuration("request_rate must be greater than zero".to_string())
            })?
            .allow_burst(NonZeroU32::MIN);

        Ok(SecClient {
            client,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            retry: RetryPolicy::new(config.max_retries),
            retries: Arc::new(AtomicU64::new(0)),
            archives_url: config.urls.archives.trim_end_matches('/').to_string(),
            data_url: config.urls.data.trim_end_matches('/').to_string(),
            tickers_url: config.urls.tickers.clone(),
        })
    }

    /// Replaces the retry policy, keeping the limiter and counter.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetches a URL through the rate limiter, retrying transient failures.
    ///
    /// # Errors
    ///
    /// * `ScanError::PermanentRequest` - a 4xx other than 429; never retried
    /// * `ScanError::UpstreamUnavailable` - transient failures outlasted the retry policy
    /// * `ScanError::InvalidResponse` - an unexpected non-error status
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut retries = 0;

        loop {
            self.rate_limiter.until_ready().await;

            let (reason, retry_after) = match self.client.get(url).send().await {
                Ok(response) => match response.status() {
                    status if status.is_success() => match response.bytes().await {
                        Ok(body) => return Ok(body.to_vec()),
                        Err(e) => (format!("body read failed: {e}"), None),
                    },
                    status
                        if status == StatusCode::TOO_MANY_REQUESTS
                            || status.is_server_error() =>
                    {
                        let retry_after = response
                            .headers()
                            .get(RETRY_AFTER)
                            .and_then(|h| h.to_str().ok())
                            .and_then(|v| parse_retry_after(v, Utc::now()));
                        (format!("status {status}"), retry_after)
                    }
                    status if status.is_client_error() => {
                        return Err(ScanError::PermanentRequest {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    status => {
                        return Err(ScanError::InvalidResponse(format!(
                            "Unexpected status code: {} for URL: {}",
                            status, url
                        )));
                    }
                },
                Err(e) => (format!("request failed: {e}"), None),
            };

            if retries >= self.retry.max_retries {
                tracing::warn!(url, attempts = retries + 1, %reason, "giving up on request");
                return Err(ScanError::UpstreamUnavailable {
                    url: url.to_string(),
                    attempts: retries + 1,
                });
            }

            let delay = self.retry.delay_for(retries, retry_after);
            tracing::warn!(
                "{} for {}. Attempt {}/{}. Waiting for {:?} before retry.",
                reason,
                url,
                retries + 1,
                self.retry.max_retries + 1,
                delay
            );
            sleep(delay).await;
            retries += 1;
            self.retries.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Fetches a text resource. Invalid UTF-8 is replaced rather than rejected; EDGAR
    /// headers occasionally carry Latin-1 company names.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let body = self.fetch(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Fetches and deserializes a JSON resource.
    ///
    /// EDGAR answers some JSON URLs with an HTML error page and a 200 status; that case
    /// is reported as `InvalidResponse` with a preview instead of a bare parse error.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.fetch(url).await?;
        serde_json::from_slice(&body).map_err(|e| {
            let text = String::from_utf8_lossy(&body);
            if text.trim_start().starts_with('<') {
                ScanError::InvalidResponse(format!(
                    "Expected JSON from {}, got HTML: {}",
                    url,
                    text.chars().take(200).collect::<String>()
                ))
            } else {
                ScanError::Json(e)
            }
        })
    }

    /// Retries performed by this client and all of its clones.
    pub fn retries_performed(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn archives_url(&self) -> &str {
        &self.archives_url
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn tickers_url(&self) -> &str {
        &self.tickers_url
    }
}

impl ScanSource for SecClient {
    fn retries_performed(&self) -> u64 {
        SecClient::retries_performed(self)
    }
}
