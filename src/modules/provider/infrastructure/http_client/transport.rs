//! Raw HTTP access to the upstream, one request per call.
//!
//! Retries live in the fetch gateway; this layer only paces requests through
//! a governor limiter, sends the browser-like headers and classifies the
//! outcome into the crate error taxonomy.

use super::retry_policy::is_retryable_status;
use crate::shared::config::AppConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::text::truncate;
use crate::log_warn;
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter as GovernorRateLimiter,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;

type DirectLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// GET a JSON document.
    async fn get_json(&self, url: &str) -> AppResult<Value>;

    /// GET an HTML page as text.
    async fn get_html(&self, url: &str) -> AppResult<String>;
}

pub struct HttpTransport {
    client: Client,
    rate_limiter: DirectLimiter,
    page_timeout: Duration,
    provider_name: String,
}

impl HttpTransport {
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value("user agent", &config.user_agent)?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(REFERER, header_value("referer", &config.referer)?);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rate_limiter: Self::create_rate_limiter(config.requests_per_second),
            page_timeout: config.page_wait,
            provider_name: "SofaScore".to_string(),
        })
    }

    fn create_rate_limiter(requests_per_second: u32) -> DirectLimiter {
        let per_second = NonZeroU32::new(requests_per_second.max(1)).unwrap_or(NonZeroU32::MIN);
        GovernorRateLimiter::direct(Quota::per_second(per_second).allow_burst(NonZeroU32::MIN))
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Check if a request can be made now (for testing/debugging)
    pub fn can_make_request_now(&self) -> bool {
        self.rate_limiter.check().is_ok()
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> AppResult<Response> {
        self.rate_limiter.until_ready().await;

        let response = request.send().await.map_err(|e| {
            log_warn!("{} request to {} failed: {}", self.provider_name, url, e);
            AppError::from(e)
        })?;

        match classify_status(response.status(), response.headers(), url) {
            Some(error) => Err(error),
            None => Ok(response),
        }
    }
}

#[async_trait]
impl UpstreamTransport for HttpTransport {
    async fn get_json(&self, url: &str) -> AppResult<Value> {
        let response = self.send(self.client.get(url), url).await?;
        let body = response.text().await.map_err(AppError::from)?;

        serde_json::from_str(&body).map_err(|e| {
            AppError::ParseError(format!(
                "Response from {} is not JSON: {}. Body: {}",
                url,
                e,
                truncate(&body, 200)
            ))
        })
    }

    async fn get_html(&self, url: &str) -> AppResult<String> {
        let request = self
            .client
            .get(url)
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .timeout(self.page_timeout);
        let response = self.send(request, url).await?;
        response.text().await.map_err(AppError::from)
    }
}

fn header_value(what: &str, value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::ValidationError(format!("Invalid {} header: {}", what, e)))
}

/// Map a non-success status to the error the gateway acts on.
pub fn classify_status(status: StatusCode, headers: &HeaderMap, url: &str) -> Option<AppError> {
    if status.is_success() {
        return None;
    }

    let error = match status.as_u16() {
        404 => AppError::NotFound(format!("{} returned 404", url)),
        429 => {
            let retry_after = headers
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .map(|s| format!(" (retry-after {}s)", s))
                .unwrap_or_default();
            AppError::RateLimited(format!("{} throttled the request{}", url, retry_after))
        }
        408 => AppError::Timeout(format!("{} answered 408", url)),
        _ if is_retryable_status(status) => {
            AppError::UpstreamUnavailable(format!("{} answered {}", url, status))
        }
        // 401/403 mean the request was blocked; it may pass on a later attempt
        _ => AppError::UpstreamUnavailable(format!("{} rejected the request: {}", url, status)),
    };
    Some(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let transport = HttpTransport::from_config(&AppConfig::default()).unwrap();
        assert_eq!(transport.provider_name(), "SofaScore");
        assert!(transport.can_make_request_now());
    }

    #[test]
    fn test_classify_not_found() {
        let err = classify_status(StatusCode::NOT_FOUND, &HeaderMap::new(), "u").unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_classify_rate_limit_mentions_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("30"));
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, &headers, "u").unwrap();
        assert!(matches!(err, AppError::RateLimited(ref m) if m.contains("30")));
    }

    #[test]
    fn test_classify_server_error_is_transient() {
        let err = classify_status(StatusCode::SERVICE_UNAVAILABLE, &HeaderMap::new(), "u").unwrap();
        assert!(err.is_transient());
    }

    #[test]
    fn test_success_is_not_an_error() {
        assert!(classify_status(StatusCode::OK, &HeaderMap::new(), "u").is_none());
    }
}
