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


//! Streaming service client
//!
//! [`StreamClient`] owns everything with state: the auth manager, the
//! response cache and the transport. Construct it once per process and
//! share it by reference; the public operations are spread over the other
//! `api` modules as further `impl StreamClient` blocks.
//!
//! Every request goes through [`StreamClient::request`]:
//!
//! 1. ensure credentials are ready (unless `skip_auth`)
//! 2. build the URL, appending `locale` and `preferred_audio_language`
//!    (unless `skip_locale`)
//! 3. serve GETs from the cache when possible
//! 4. attach `Authorization: Bearer …` and send
//! 5. map the status: 401/403 invalidate the token, 429 becomes
//!    `RateLimitExceeded`, any other non-2xx becomes `Http`
//! 6. store successful GETs in the cache

use crate::api::auth::{AuthManager, AuthSettings};
use crate::api::cache::{cache_key, RequestCache};
use crate::api::credentials::CredentialSource;
use crate::api::transport::{HttpRequest, ReqwestTransport, Transport};
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::error::{BridgeError, Result};
use crate::storage::credentials::CredentialStore;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Longest response excerpt carried in an error message
const ERROR_BODY_EXCERPT: usize = 200;

/// Per-call knobs for [`StreamClient::request`]
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Only honoured for GET
    pub use_cache: bool,
    /// `None` uses the configured default TTL
    pub cache_ttl: Option<Duration>,
    pub headers: HeaderMap,
    /// Overrides the main service host
    pub base_url: Option<String>,
    pub skip_auth: bool,
    pub skip_locale: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            params: Vec::new(),
            body: None,
            use_cache: true,
            cache_ttl: None,
            headers: HeaderMap::new(),
            base_url: None,
            skip_auth: false,
            skip_locale: false,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Add the parameter only when a value is present
    pub fn opt_param<K: Into<String>, V: ToString>(self, key: K, value: Option<V>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.use_cache = true;
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    pub fn skip_locale(mut self) -> Self {
        self.skip_locale = true;
        self
    }
}

/// Client for the streaming service's web API
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use watchbridge_core::api::client::StreamClient;
/// use watchbridge_core::api::credentials::{credential_channel, MessageCredentialSource};
/// use watchbridge_core::config::ClientConfig;
///
/// # async fn example() -> watchbridge_core::error::Result<()> {
/// let config = ClientConfig::default();
/// let (channel, _host) = credential_channel(8);
/// let source = MessageCredentialSource::new(
///     channel,
///     config.credential_timeout,
///     config.credential_backoff,
/// );
///
/// let client = StreamClient::builder(config)
///     .credential_source(Arc::new(source))
///     .build()?;
///
/// let watchlist = client.get_watchlist(&Default::default()).await?;
/// println!("{} entries", watchlist.total);
/// # Ok(())
/// # }
/// ```
pub struct StreamClient {
    config: ClientConfig,
    auth: AuthManager,
    cache: RequestCache<Value>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("config", &self.config)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl StreamClient {
    pub fn builder(config: ClientConfig) -> StreamClientBuilder {
        StreamClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub(crate) fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Perform one API request and deserialize the body into `T`
    ///
    /// An empty 2xx body deserializes from `null`.
    ///
    /// # Errors
    /// - `Auth` if credentials cannot be made ready
    /// - `Http` for any non-2xx status (401/403 also invalidate the token)
    /// - `RateLimitExceeded` for 429
    /// - `InvalidApiResponse` if the body does not fit `T`
    pub async fn request<T>(&self, method: Method, path: &str, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = self.request_value(method, path, options).await?;
        serde_json::from_value(value).map_err(|e| {
            BridgeError::invalid_response(format!("{}: {}", path, e), None)
        })
    }

    async fn request_value(&self, method: Method, path: &str, options: RequestOptions) -> Result<Value> {
        let snapshot = if options.skip_auth {
            None
        } else {
            self.auth.ensure_ready().await?;
            Some(self.auth.snapshot().await?)
        };

        let base = options.base_url.as_deref().unwrap_or(&self.config.base_url);
        let mut url = Url::parse(&format!("{}{}", base.trim_end_matches('/'), path))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &options.params {
                query.append_pair(key, value);
            }
            if !options.skip_locale {
                let (locale, audio) = match snapshot {
                    Some(ref s) => (s.locale.clone(), s.preferred_audio_language.clone()),
                    None => {
                        let locale = self.auth.locale().await;
                        (locale.clone(), locale)
                    }
                };
                query.append_pair("locale", &locale);
                query.append_pair("preferred_audio_language", &audio);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let cacheable = method == Method::GET && options.use_cache;
        let key = cache_key(method.as_str(), url.as_str());
        if cacheable {
            if let Some(hit) = self.cache.get(&key).await {
                debug!(path, "cache hit");
                return Ok(hit);
            }
        }

        let mut request = HttpRequest::new(method.clone(), url);
        request.headers = options.headers;
        if let Some(ref snapshot) = snapshot {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", snapshot.access_token))
                .map_err(|e| BridgeError::InvalidInput(format!("Invalid access token: {}", e)))?;
            request.headers.insert(AUTHORIZATION, bearer);
        }
        if method != Method::GET {
            request.body = options.body;
        }

        let response = self.transport.send(request).await?;

        if !response.is_success() {
            let excerpt: String = response.body.chars().take(ERROR_BODY_EXCERPT).collect();
            return Err(match response.status {
                401 | 403 => {
                    warn!(status = response.status, path, "request rejected, dropping token");
                    if snapshot.is_some() {
                        self.auth.invalidate().await;
                    }
                    BridgeError::http(response.status, excerpt, Some(path.to_string()))
                }
                429 => BridgeError::RateLimitExceeded {
                    retry_after_seconds: response.retry_after.unwrap_or(60),
                    endpoint: path.to_string(),
                },
                status => {
                    debug!(status, path, "request failed");
                    BridgeError::http(status, excerpt, Some(path.to_string()))
                }
            });
        }

        let value = if response.body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&response.body).map_err(|e| {
                BridgeError::invalid_response(
                    format!("{}: {}", path, e),
                    Some(response.body.chars().take(ERROR_BODY_EXCERPT).collect()),
                )
            })?
        };

        if cacheable {
            let ttl = options.cache_ttl.unwrap_or_else(|| self.cache.default_ttl());
            self.cache.set(&key, value.clone(), ttl).await;
        }

        Ok(value)
    }

    /// Account id for account-scoped paths, bootstrapping if needed
    pub(crate) async fn account_id(&self) -> Result<String> {
        self.auth.ensure_ready().await?;
        self.auth.account_id().await
    }

    /// Drop every cache entry whose key contains `fragment`
    pub(crate) async fn invalidate(&self, fragment: &str) -> usize {
        self.cache.invalidate_by_prefix(fragment).await
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Evict expired cache entries; returns how many were dropped
    pub async fn cleanup_cache(&self) -> usize {
        self.cache.cleanup().await
    }

    /// Forget credentials everywhere and empty the cache
    pub async fn sign_out(&self) -> Result<()> {
        self.cache.clear().await;
        self.auth.sign_out().await
    }
}

/// Path segment with reserved characters escaped
pub(crate) fn segment(id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(BridgeError::InvalidInput("content id must not be empty".to_string()));
    }
    Ok(urlencoding::encode(id).into_owned())
}

/// Builder wiring a [`StreamClient`] to its collaborators
pub struct StreamClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    source: Option<Arc<dyn CredentialSource>>,
    store: Option<CredentialStore>,
    clock: Option<Arc<dyn Clock>>,
}

impl StreamClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            source: None,
            store: None,
            clock: None,
        }
    }

    /// Defaults to a [`ReqwestTransport`] built from the config
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Required
    pub fn credential_source(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Defaults to in-memory stores
    pub fn credential_store(mut self, store: CredentialStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to the system clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// # Errors
    /// `InvalidConfiguration` if the config does not validate or no
    /// credential source was given
    pub fn build(self) -> Result<StreamClient> {
        self.config.validate()?;

        let source = self.source.ok_or_else(|| {
            BridgeError::InvalidConfiguration("a credential source is required".to_string())
        })?;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self.store.unwrap_or_else(CredentialStore::in_memory);

        let auth = AuthManager::new(
            AuthSettings {
                base_url: self.config.base_url.clone(),
                expiry_margin: self.config.token_expiry_margin,
                credential_retries: self.config.credential_retries,
            },
            store,
            source,
            Arc::clone(&transport),
            Arc::clone(&clock),
        );

        Ok(StreamClient {
            cache: RequestCache::new(Arc::clone(&clock), self.config.default_cache_ttl),
            config: self.config,
            auth,
            transport,
            clock,
        })
    }
}
