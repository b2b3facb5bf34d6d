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


//! Client configuration
//!
//! [`ClientConfig`] collects every tunable of the client: service hosts,
//! transport behaviour, cache TTL, token expiry margin and the credential
//! channel's timeout/retry policy. Build it with [`ClientConfig::builder`]
//! or load it from `WATCHBRIDGE_*` environment variables.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use watchbridge_core::config::ClientConfig;
//!
//! let config = ClientConfig::builder()
//!     .base_url("https://www.crunchyroll.com")
//!     .timeout(Duration::from_secs(15))
//!     .build();
//! assert_eq!(config.credential_retries, 2);
//! ```

use crate::error::{BridgeError, Result};
use std::env;
use std::time::Duration;

/// Main service host
pub const DEFAULT_BASE_URL: &str = "https://www.crunchyroll.com";

/// Playback (stream token) service host
pub const DEFAULT_PLAYBACK_BASE_URL: &str = "https://cr-play-service.prd.crunchyrollsvc.com";

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum transport attempts (1 initial + 2 retries)
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default cache TTL in seconds (5 minutes)
const DEFAULT_CACHE_TTL_SECS: u64 = 5 * 60;

/// Tokens are treated as expired this long before their real expiry
const DEFAULT_TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

/// How long one credential request waits for the host page
const DEFAULT_CREDENTIAL_TIMEOUT_MS: u64 = 5_000;

const DEFAULT_CREDENTIAL_RETRIES: u32 = 2;

/// Linear backoff step between credential attempts
const DEFAULT_CREDENTIAL_BACKOFF_MS: u64 = 300;

/// Watchlist entries fetched for a membership check
const DEFAULT_WATCHLIST_SCAN_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub playback_base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
    pub enable_cookies: bool,
    pub default_cache_ttl: Duration,
    pub token_expiry_margin: Duration,
    pub credential_timeout: Duration,
    pub credential_retries: u32,
    pub credential_backoff: Duration,
    pub watchlist_scan_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            playback_base_url: DEFAULT_PLAYBACK_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            user_agent: format!("WatchBridge/{} (watchbridge-core)", env!("CARGO_PKG_VERSION")),
            enable_cookies: true,
            default_cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            token_expiry_margin: Duration::from_secs(DEFAULT_TOKEN_EXPIRY_MARGIN_SECS),
            credential_timeout: Duration::from_millis(DEFAULT_CREDENTIAL_TIMEOUT_MS),
            credential_retries: DEFAULT_CREDENTIAL_RETRIES,
            credential_backoff: Duration::from_millis(DEFAULT_CREDENTIAL_BACKOFF_MS),
            watchlist_scan_size: DEFAULT_WATCHLIST_SCAN_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Load configuration from environment variables with defaults
    ///
    /// Unparseable values fall back to the default for that field.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            base_url: env::var("WATCHBRIDGE_BASE_URL").unwrap_or(defaults.base_url),
            playback_base_url: env::var("WATCHBRIDGE_PLAYBACK_URL")
                .unwrap_or(defaults.playback_base_url),
            timeout: env_parse("WATCHBRIDGE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: env_parse("WATCHBRIDGE_MAX_RETRIES").unwrap_or(defaults.max_retries),
            user_agent: env::var("WATCHBRIDGE_USER_AGENT").unwrap_or(defaults.user_agent),
            enable_cookies: env_parse("WATCHBRIDGE_COOKIES").unwrap_or(defaults.enable_cookies),
            default_cache_ttl: env_parse("WATCHBRIDGE_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_cache_ttl),
            token_expiry_margin: defaults.token_expiry_margin,
            credential_timeout: env_parse("WATCHBRIDGE_CREDENTIAL_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.credential_timeout),
            credential_retries: env_parse("WATCHBRIDGE_CREDENTIAL_RETRIES")
                .unwrap_or(defaults.credential_retries),
            credential_backoff: defaults.credential_backoff,
            watchlist_scan_size: env_parse("WATCHBRIDGE_WATCHLIST_SCAN_SIZE")
                .unwrap_or(defaults.watchlist_scan_size),
        }
    }

    /// Reject configurations the client cannot work with
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("base_url", &self.base_url), ("playback_base_url", &self.playback_base_url)] {
            let parsed = url::Url::parse(value).map_err(|e| {
                BridgeError::InvalidConfiguration(format!("{} '{}': {}", name, value, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(BridgeError::InvalidConfiguration(format!(
                    "{} must be http(s), got '{}'",
                    name, value
                )));
            }
        }

        if self.timeout.is_zero() {
            return Err(BridgeError::InvalidConfiguration(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(BridgeError::InvalidConfiguration(
                "max_retries must allow at least one attempt".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Builder for ClientConfig
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn playback_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.playback_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn enable_cookies(mut self, enable: bool) -> Self {
        self.config.enable_cookies = enable;
        self
    }

    pub fn default_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_cache_ttl = ttl;
        self
    }

    pub fn token_expiry_margin(mut self, margin: Duration) -> Self {
        self.config.token_expiry_margin = margin;
        self
    }

    pub fn credential_timeout(mut self, timeout: Duration) -> Self {
        self.config.credential_timeout = timeout;
        self
    }

    pub fn credential_retries(mut self, retries: u32) -> Self {
        self.config.credential_retries = retries;
        self
    }

    pub fn credential_backoff(mut self, step: Duration) -> Self {
        self.config.credential_backoff = step;
        self
    }

    pub fn watchlist_scan_size(mut self, size: u32) -> Self {
        self.config.watchlist_scan_size = size;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.default_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.token_expiry_margin, Duration::from_secs(60));
        assert_eq!(config.credential_timeout, Duration::from_secs(5));
        assert_eq!(config.credential_retries, 2);
        assert_eq!(config.credential_backoff, Duration::from_millis(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::builder()
            .base_url("http://localhost:8080/")
            .playback_base_url("http://localhost:9090")
            .timeout(Duration::from_secs(60))
            .max_retries(5)
            .user_agent("TestAgent/1.0")
            .enable_cookies(false)
            .watchlist_scan_size(25)
            .build();

        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.playback_base_url, "http://localhost:9090");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.user_agent, "TestAgent/1.0");
        assert!(!config.enable_cookies);
        assert_eq!(config.watchlist_scan_size, 25);
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let config = ClientConfig::builder().base_url("ftp://example.com").build();
        assert!(matches!(
            config.validate(),
            Err(BridgeError::InvalidConfiguration(_))
        ));

        let config = ClientConfig::builder().base_url("not a url").build();
        assert!(config.validate().is_err());

        let config = ClientConfig::builder().timeout(Duration::ZERO).build();
        assert!(config.validate().is_err());
    }
}
