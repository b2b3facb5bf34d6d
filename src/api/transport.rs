// WatchBridge - Streaming companion client core
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! HTTP transport
//!
//! [`Transport`] is the seam between request building and the network.
//! [`ReqwestTransport`] is the production implementation; tests substitute
//! a scripted transport.
//!
//! ## Retry Strategy
//! - Maximum `max_retries` attempts (default 3: 1 initial + 2 retries)
//! - Exponential backoff: 1s, 2s, 4s between retries, capped at 60s
//! - Retry on: connect/timeout errors, 5xx responses
//! - Only idempotent methods (GET, PUT, DELETE) are retried
//! - Never retried here: 4xx responses, including 401/403 (the auth layer
//!   reacts to those)
//!
//! Non-2xx responses are returned as [`HttpResponse`] values, not errors;
//! status interpretation belongs to the caller. A 2xx whose body cannot be
//! read is a `NetworkError`, never an empty body.

use crate::config::ClientConfig;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Method, Response};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

/// Initial retry delay in seconds (exponential backoff: 1s, 2s, 4s)
const INITIAL_RETRY_DELAY_SECS: u64 = 1;

/// Upper bound for a single backoff sleep
const MAX_RETRY_DELAY_SECS: u64 = 60;

/// Fallback when a 429 carries no usable Retry-After
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Fully built request, ready to send
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// Raw response: status, body text and parsed Retry-After
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub retry_after: Option<u64>,
}

impl HttpResponse {
    pub fn new<S: Into<String>>(status: u16, body: S) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    max_retries: u32,
}

impl ReqwestTransport {
    /// Build the underlying client from configuration
    ///
    /// # Errors
    /// Returns error if the user agent is not a valid header value or the
    /// HTTP client cannot be built
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| BridgeError::InvalidInput(format!("Invalid user agent: {}", e)))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut client_builder = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90));

        if config.enable_cookies {
            client_builder = client_builder.cookie_store(true);
        }

        Ok(Self {
            client: client_builder.build()?,
            max_retries: config.max_retries.max(1),
        })
    }

    fn is_idempotent(method: &Method) -> bool {
        matches!(*method, Method::GET | Method::PUT | Method::DELETE | Method::HEAD)
    }

    fn is_retryable_network_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect()
    }

    /// Read status, Retry-After and body
    ///
    /// A body that cannot be read is an error on 2xx responses. On error
    /// statuses the body is only an excerpt, so it degrades to empty.
    async fn into_response(response: Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let success = response.status().is_success();
        let path = response.url().path().to_string();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .or(if status == 429 { Some(DEFAULT_RETRY_AFTER_SECS) } else { None });
        let body = if success {
            response.text().await.map_err(|e| {
                warn!(status, path = %path, error = %e, "failed to read response body");
                BridgeError::network_error(format!("Failed to read response body: {}", e), true)
            })?
        } else {
            response.text().await.unwrap_or_default()
        };

        Ok(HttpResponse {
            status,
            body,
            retry_after,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let retryable = Self::is_idempotent(&request.method);
        let max_attempts = if retryable { self.max_retries } else { 1 };
        let mut attempts = 0;

        loop {
            attempts += 1;

            let mut builder = self
                .client
                .request(request.method.clone(), request.url.clone())
                .headers(request.headers.clone());
            if let Some(ref body) = request.body {
                builder = builder.json(body);
            }

            debug!(method = %request.method, path = request.url.path(), attempt = attempts, "sending request");

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() && attempts < max_attempts {
                        warn!(status = status.as_u16(), path = request.url.path(), "server error, retrying");
                        sleep(backoff_delay(attempts)).await;
                        continue;
                    }
                    return Self::into_response(response).await;
                }
                Err(e) if attempts < max_attempts && Self::is_retryable_network_error(&e) => {
                    warn!(error = %e, path = request.url.path(), "network error, retrying");
                    sleep(backoff_delay(attempts)).await;
                }
                Err(e) => {
                    let transient = Self::is_retryable_network_error(&e);
                    return Err(BridgeError::network_error(
                        format!("Network request failed: {}", e),
                        transient,
                    ));
                }
            }
        }
    }
}

/// Exponential backoff for the given (1-based) attempt, capped at
/// `MAX_RETRY_DELAY_SECS`
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2_u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_secs(INITIAL_RETRY_DELAY_SECS.saturating_mul(factor).min(MAX_RETRY_DELAY_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_delay_is_capped_for_large_attempts() {
        assert_eq!(backoff_delay(7), Duration::from_secs(MAX_RETRY_DELAY_SECS));
        assert_eq!(backoff_delay(65), Duration::from_secs(MAX_RETRY_DELAY_SECS));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(MAX_RETRY_DELAY_SECS));
    }

    #[test]
    fn test_idempotent_methods() {
        assert!(ReqwestTransport::is_idempotent(&Method::GET));
        assert!(ReqwestTransport::is_idempotent(&Method::DELETE));
        assert!(ReqwestTransport::is_idempotent(&Method::PUT));
        assert!(!ReqwestTransport::is_idempotent(&Method::POST));
    }

    #[test]
    fn test_transport_rejects_bad_user_agent() {
        let config = ClientConfig::builder().user_agent("bad\nagent").build();
        assert!(matches!(
            ReqwestTransport::new(&config),
            Err(BridgeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_response_success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(409, "").is_success());
        assert!(!HttpResponse::new(301, "").is_success());
    }
}
