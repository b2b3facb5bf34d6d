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


//! Authentication state and bootstrap
//!
//! The service's web API accepts the same short-lived bearer token the
//! website itself uses. We never log in ourselves: the token is captured by
//! the content script running in the host page and handed to us over the
//! credential channel (see [`crate::api::credentials`]).
//!
//! # State machine
//!
//! ```text
//!   ┌────────────┐ ensure_ready ┌──────────────┐
//!   │ not ready  │─────────────▶│ bootstrapping│ (single flight)
//!   └────────────┘              └──────┬───────┘
//!         ▲                            │ token + profile
//!         │ 401/403, expiry            ▼
//!         │                      ┌──────────┐
//!         └──────────────────────│  ready   │
//!                                └──────────┘
//! ```
//!
//! A bootstrap tries, in order:
//! 1. persisted credentials (session store, then extension store)
//! 2. the host page scraper, with timeout and linear backoff
//! 3. the multiprofile endpoint, if a token exists but no profile id
//!
//! # Expiry
//! A token is expired iff `now >= expires_at - margin` (margin defaults to
//! 60 seconds). Expired tokens are never attached to new requests.
//!
//! # Single flight
//! Concurrent [`AuthManager::ensure_ready`] calls share one bootstrap. The
//! bootstrap runs as its own task, so a caller dropping its future does not
//! cancel it; the task clears the in-flight slot when it settles.

use crate::api::credentials::CredentialSource;
use crate::api::profile;
use crate::api::transport::Transport;
use crate::clock::Clock;
use crate::error::{BridgeError, Result};
use crate::storage::credentials::CredentialStore;
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Locale used when the country is unknown or missing
pub const DEFAULT_LOCALE: &str = "en-US";

lazy_static::lazy_static! {
    /// ISO country code → content locale
    static ref COUNTRY_LOCALES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        for cc in ["US", "CA", "GB", "IE", "AU", "NZ", "ZA", "PH", "SG"] {
            m.insert(cc, "en-US");
        }
        for cc in [
            "MX", "AR", "CL", "CO", "PE", "VE", "EC", "UY", "PY", "BO", "CR", "GT", "HN",
            "NI", "PA", "SV", "DO", "CU", "PR",
        ] {
            m.insert(cc, "es-419");
        }
        m.insert("ES", "es-ES");
        m.insert("BR", "pt-BR");
        m.insert("PT", "pt-PT");
        for cc in ["FR", "BE", "LU", "MC"] {
            m.insert(cc, "fr-FR");
        }
        for cc in ["DE", "AT", "CH", "LI"] {
            m.insert(cc, "de-DE");
        }
        m.insert("IT", "it-IT");
        m.insert("RU", "ru-RU");
        for cc in ["SA", "AE", "EG", "KW", "QA", "BH", "OM", "JO", "LB", "MA", "DZ", "TN"] {
            m.insert(cc, "ar-SA");
        }
        m.insert("IN", "hi-IN");
        m.insert("JP", "ja-JP");
        m
    };
}

/// Content locale for a country code (case-insensitive), `en-US` when unknown
pub fn locale_for_country(country: Option<&str>) -> &'static str {
    country
        .map(|c| c.trim().to_ascii_uppercase())
        .and_then(|c| COUNTRY_LOCALES.get(c.as_str()).copied())
        .unwrap_or(DEFAULT_LOCALE)
}

/// Mask an identifier for logging
///
/// Shows first 2 and last 2 characters, replaces the middle with asterisks
pub fn mask_id(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    match chars.len() {
        0 => "[empty]".to_string(),
        1..=4 => "****".to_string(),
        n => {
            let head: String = chars[..2].iter().collect();
            let tail: String = chars[n - 2..].iter().collect();
            format!("{}{}{}", head, "*".repeat(n - 4), tail)
        }
    }
}

// ============================================================================
// Credential data
// ============================================================================

/// Bearer token captured from the host page
///
/// Field names follow the content script's JSON (`accessToken`, `expiresAt`
/// in epoch milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,

    /// ISO country code of the account, drives the locale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl TokenData {
    /// True once `now` is within `margin` of the expiry
    pub fn is_expired_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
        now >= self.expires_at - margin
    }

    pub fn locale(&self) -> &'static str {
        locale_for_country(self.country.as_deref())
    }

    /// Audio language requested alongside the locale
    pub fn preferred_audio_language(&self) -> &'static str {
        self.locale()
    }
}

/// One profile of the account
///
/// Accepts both the content script's camelCase and the service's snake_case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    #[serde(alias = "profile_id")]
    pub profile_id: String,

    #[serde(default, alias = "account_id", skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    #[serde(default, alias = "is_selected")]
    pub is_selected: bool,
}

/// The selected profile, or the first one when none is marked selected
pub fn select_profile(profiles: Vec<ProfileData>) -> Option<ProfileData> {
    let selected = profiles.iter().position(|p| p.is_selected);
    let mut profiles = profiles;
    match selected {
        Some(i) => Some(profiles.swap_remove(i)),
        None if !profiles.is_empty() => Some(profiles.swap_remove(0)),
        None => None,
    }
}

/// Credentials in effect for one request
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    pub access_token: String,
    pub account_id: Option<String>,
    pub profile_id: String,
    pub locale: String,
    pub preferred_audio_language: String,
}

/// Tunables for the auth manager, taken from `ClientConfig`
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub base_url: String,
    pub expiry_margin: Duration,
    pub credential_retries: u32,
}

#[derive(Debug, Default)]
struct AuthState {
    token: Option<TokenData>,
    profile: Option<ProfileData>,
}

type Bootstrap = Shared<BoxFuture<'static, bool>>;

struct AuthInner {
    state: Mutex<AuthState>,
    in_flight: Mutex<Option<Bootstrap>>,
    store: CredentialStore,
    source: Arc<dyn CredentialSource>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    settings: AuthSettings,
}

/// Owner of the in-memory token and profile
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AuthManager {
    inner: Arc<AuthInner>,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl AuthManager {
    pub fn new(
        settings: AuthSettings,
        store: CredentialStore,
        source: Arc<dyn CredentialSource>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(AuthInner {
                state: Mutex::new(AuthState::default()),
                in_flight: Mutex::new(None),
                store,
                source,
                transport,
                clock,
                settings,
            }),
        }
    }

    /// True when a non-expired token and a profile id are held in memory
    pub async fn is_ready(&self) -> bool {
        let state = self.inner.state.lock().await;
        self.inner.state_ready(&state)
    }

    /// Guarantee a usable token and profile id, bootstrapping if needed
    ///
    /// # Errors
    /// `BridgeError::Auth` when the bootstrap could not produce both.
    pub async fn ensure_ready(&self) -> Result<()> {
        if self.is_ready().await {
            return Ok(());
        }

        let bootstrap = {
            let mut slot = self.inner.in_flight.lock().await;
            match slot.as_ref() {
                Some(existing) => {
                    debug!("joining in-flight bootstrap");
                    existing.clone()
                }
                None => {
                    // Another bootstrap may have settled while we waited for the slot
                    if self.is_ready().await {
                        return Ok(());
                    }

                    let inner = Arc::clone(&self.inner);
                    let task = tokio::spawn(async move {
                        let ready = inner.bootstrap().await;
                        inner.in_flight.lock().await.take();
                        ready
                    });
                    let shared = async move { task.await.unwrap_or(false) }.boxed().shared();
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };

        if bootstrap.await {
            Ok(())
        } else {
            let account_id = self.inner.state.lock().await.token.as_ref().and_then(|t| t.account_id.clone());
            Err(BridgeError::auth_failed("credentials missing", account_id))
        }
    }

    /// Current credentials, without triggering a bootstrap
    pub async fn snapshot(&self) -> Result<AuthSnapshot> {
        let state = self.inner.state.lock().await;
        let now = self.inner.clock.now();

        let token = state
            .token
            .as_ref()
            .filter(|t| !t.is_expired_at(now, self.inner.settings.expiry_margin))
            .ok_or_else(|| BridgeError::auth_failed("credentials missing", None))?;
        let profile = state.profile.as_ref().ok_or_else(|| {
            BridgeError::auth_failed("profile missing", token.account_id.clone())
        })?;

        Ok(AuthSnapshot {
            access_token: token.access_token.clone(),
            account_id: token.account_id.clone().or_else(|| profile.account_id.clone()),
            profile_id: profile.profile_id.clone(),
            locale: token.locale().to_string(),
            preferred_audio_language: token.preferred_audio_language().to_string(),
        })
    }

    /// Account id for account-scoped paths
    pub async fn account_id(&self) -> Result<String> {
        let state = self.inner.state.lock().await;
        state
            .token
            .as_ref()
            .and_then(|t| t.account_id.clone())
            .or_else(|| state.profile.as_ref().and_then(|p| p.account_id.clone()))
            .ok_or_else(|| BridgeError::auth_failed("account id missing", None))
    }

    /// Locale of the current token
    ///
    /// Without a token in memory, the locale a previous session persisted,
    /// then `en-US`.
    pub async fn locale(&self) -> String {
        let held = {
            let state = self.inner.state.lock().await;
            state.token.as_ref().map(|t| t.locale().to_string())
        };
        if let Some(locale) = held {
            return locale;
        }

        match self.inner.store.load().await {
            Ok(persisted) => persisted.locale.unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            Err(e) => {
                warn!(error = %e, "failed to load persisted locale");
                DEFAULT_LOCALE.to_string()
            }
        }
    }

    /// Force the next operation through bootstrap
    ///
    /// Called on 401/403. The token stays in memory with its expiry cleared,
    /// and the cleared expiry is persisted so a reload does not resurrect it.
    pub async fn invalidate(&self) {
        let token = {
            let mut state = self.inner.state.lock().await;
            state.token.as_mut().map(|t| {
                t.expires_at = DateTime::<Utc>::UNIX_EPOCH;
                t.clone()
            })
        };

        if let Some(token) = token {
            info!("access token rejected, invalidated");
            if let Err(e) = self.inner.store.save_token(&token).await {
                warn!(error = %e, "failed to persist invalidated token");
            }
        }
    }

    /// Drop all credentials from memory and both stores
    pub async fn sign_out(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock().await;
            *state = AuthState::default();
        }
        self.inner.store.clear().await
    }
}

impl AuthInner {
    fn token_valid(&self, token: Option<&TokenData>) -> bool {
        token.is_some_and(|t| !t.is_expired_at(self.clock.now(), self.settings.expiry_margin))
    }

    fn state_ready(&self, state: &AuthState) -> bool {
        self.token_valid(state.token.as_ref()) && state.profile.is_some()
    }

    async fn bootstrap(&self) -> bool {
        debug!("auth bootstrap started");

        // 1. Persisted credentials
        match self.store.load().await {
            Ok(persisted) => {
                let mut state = self.state.lock().await;
                if !self.token_valid(state.token.as_ref()) && self.token_valid(persisted.token.as_ref()) {
                    debug!("using persisted token");
                    state.token = persisted.token;
                }
                if state.profile.is_none() {
                    state.profile = persisted.profile;
                }
            }
            Err(e) => warn!(error = %e, "failed to load persisted credentials"),
        }

        // 2. Host page scraper
        let has_token = {
            let state = self.state.lock().await;
            self.token_valid(state.token.as_ref())
        };
        if !has_token {
            match self.source.request_credentials(self.settings.credential_retries).await {
                Some(credentials) => {
                    let token = credentials.token_data;
                    let profile = credentials.profile_data.and_then(|p| p.into_selected());
                    self.adopt(Some(token), profile).await;
                }
                None => info!("credentials not yet available from host page"),
            }
        }

        // 3. Profile straight from the service
        let token_without_profile = {
            let state = self.state.lock().await;
            match (&state.token, &state.profile) {
                (Some(token), None) if self.token_valid(Some(token)) => Some(token.access_token.clone()),
                _ => None,
            }
        };
        if let Some(access_token) = token_without_profile {
            match profile::fetch_profiles(self.transport.as_ref(), &self.settings.base_url, &access_token).await {
                Ok(profiles) => match select_profile(profiles) {
                    Some(profile) => self.adopt(None, Some(profile)).await,
                    None => warn!("account has no profiles"),
                },
                Err(e) => warn!(error = %e, "profile lookup failed"),
            }
        }

        let state = self.state.lock().await;
        let ready = self.state_ready(&state);
        if ready {
            let account = state.token.as_ref().and_then(|t| t.account_id.as_deref()).unwrap_or("");
            info!(account = %mask_id(account), "auth bootstrap complete");
        } else {
            warn!(
                has_token = state.token.is_some(),
                has_profile = state.profile.is_some(),
                "auth bootstrap finished without usable credentials"
            );
        }
        ready
    }

    /// Replace token and/or profile wholesale and persist them
    async fn adopt(&self, token: Option<TokenData>, profile: Option<ProfileData>) {
        {
            let mut state = self.state.lock().await;
            if let Some(ref token) = token {
                state.token = Some(token.clone());
            }
            if let Some(ref profile) = profile {
                state.profile = Some(profile.clone());
            }
        }

        if let Some(token) = token {
            if let Err(e) = self.store.save_token(&token).await {
                warn!(error = %e, "failed to persist token");
            }
            if let Err(e) = self.store.save_locale(token.locale()).await {
                warn!(error = %e, "failed to persist locale");
            }
        }
        if let Some(profile) = profile {
            if let Err(e) = self.store.save_profile(&profile).await {
                warn!(error = %e, "failed to persist profile");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::credentials::{Credentials, ProfilePayload};
    use crate::api::transport::{HttpRequest, HttpResponse};
    use crate::clock::ManualClock;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        credentials: Option<Credentials>,
        delay: Duration,
    }

    #[async_trait]
    impl CredentialSource for CountingSource {
        async fn request_credentials(&self, _retries: u32) -> Option<Credentials> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.credentials.clone()
        }
    }

    struct ProfileTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for ProfileTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(request.url.path().ends_with("/accounts/v1/me/multiprofile"));
            Ok(HttpResponse::new(
                200,
                r#"{"profiles":[{"profile_id":"p-1","is_selected":false},{"profile_id":"p-2","is_selected":true}]}"#,
            ))
        }
    }

    fn token(clock: &ManualClock, valid_for: chrono::Duration) -> TokenData {
        TokenData {
            access_token: "tok".to_string(),
            account_id: Some("acc-1".to_string()),
            expires_at: clock.now() + valid_for,
            country: Some("BR".to_string()),
        }
    }

    fn manager(
        clock: Arc<ManualClock>,
        source: Arc<CountingSource>,
        transport: Arc<ProfileTransport>,
    ) -> AuthManager {
        AuthManager::new(
            AuthSettings {
                base_url: "https://svc.test".to_string(),
                expiry_margin: Duration::from_secs(60),
                credential_retries: 2,
            },
            CredentialStore::in_memory(),
            source,
            transport,
            clock,
        )
    }

    #[test]
    fn test_expiry_margin_boundaries() {
        let clock = ManualClock::default();
        let margin = Duration::from_secs(60);

        let t = token(&clock, chrono::Duration::milliseconds(59_000));
        assert!(t.is_expired_at(clock.now(), margin));

        let t = token(&clock, chrono::Duration::milliseconds(61_000));
        assert!(!t.is_expired_at(clock.now(), margin));

        let t = token(&clock, chrono::Duration::milliseconds(60_000));
        assert!(t.is_expired_at(clock.now(), margin));
    }

    #[test]
    fn test_locale_table() {
        assert_eq!(locale_for_country(Some("BR")), "pt-BR");
        assert_eq!(locale_for_country(Some("mx")), "es-419");
        assert_eq!(locale_for_country(Some("ES")), "es-ES");
        assert_eq!(locale_for_country(Some("ZZ")), "en-US");
        assert_eq!(locale_for_country(None), "en-US");
    }

    #[tokio::test]
    async fn test_locale_falls_back_to_persisted_without_token() {
        let clock = Arc::new(ManualClock::default());
        let store = CredentialStore::in_memory();
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            credentials: None,
            delay: Duration::ZERO,
        });
        let auth = AuthManager::new(
            AuthSettings {
                base_url: "https://svc.test".to_string(),
                expiry_margin: Duration::from_secs(60),
                credential_retries: 2,
            },
            store.clone(),
            source,
            Arc::new(ProfileTransport { calls: AtomicUsize::new(0) }),
            clock,
        );

        assert_eq!(auth.locale().await, DEFAULT_LOCALE);

        store.save_locale("ja-JP").await.unwrap();
        assert_eq!(auth.locale().await, "ja-JP");
    }

    #[test]
    fn test_mask_id() {
        assert_eq!(mask_id(""), "[empty]");
        assert_eq!(mask_id("abcd"), "****");
        assert_eq!(mask_id("abcdefgh"), "ab****gh");
    }

    #[test]
    fn test_select_profile_prefers_selected() {
        let profiles = vec![
            ProfileData { profile_id: "a".into(), account_id: None, is_selected: false },
            ProfileData { profile_id: "b".into(), account_id: None, is_selected: true },
        ];
        assert_eq!(select_profile(profiles).unwrap().profile_id, "b");

        let profiles = vec![
            ProfileData { profile_id: "a".into(), account_id: None, is_selected: false },
            ProfileData { profile_id: "b".into(), account_id: None, is_selected: false },
        ];
        assert_eq!(select_profile(profiles).unwrap().profile_id, "a");

        assert!(select_profile(vec![]).is_none());
    }

    #[test]
    fn test_token_data_parses_content_script_json() {
        let json = r#"{"accessToken":"abc","accountId":"acc","expiresAt":1767225600000,"country":"DE"}"#;
        let token: TokenData = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_at.timestamp_millis(), 1_767_225_600_000);
        assert_eq!(token.locale(), "de-DE");
    }

    #[tokio::test]
    async fn test_concurrent_ensure_ready_bootstraps_once() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            credentials: Some(Credentials {
                token_data: token(&clock, chrono::Duration::hours(1)),
                profile_data: Some(ProfilePayload::Single(ProfileData {
                    profile_id: "p-9".into(),
                    account_id: None,
                    is_selected: true,
                })),
            }),
            delay: Duration::from_millis(50),
        });
        let transport = Arc::new(ProfileTransport { calls: AtomicUsize::new(0) });
        let auth = manager(clock, Arc::clone(&source), Arc::clone(&transport));

        let calls = (0..8).map(|_| {
            let auth = auth.clone();
            tokio::spawn(async move { auth.ensure_ready().await })
        });
        for result in futures_util::future::join_all(calls).await {
            result.unwrap().unwrap();
        }

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(auth.snapshot().await.unwrap().profile_id, "p-9");
        assert_eq!(auth.locale().await, "pt-BR");
    }

    #[tokio::test]
    async fn test_profile_fetched_when_scraper_has_none() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            credentials: Some(Credentials {
                token_data: token(&clock, chrono::Duration::hours(1)),
                profile_data: None,
            }),
            delay: Duration::ZERO,
        });
        let transport = Arc::new(ProfileTransport { calls: AtomicUsize::new(0) });
        let auth = manager(clock, source, Arc::clone(&transport));

        auth.ensure_ready().await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert_eq!(auth.snapshot().await.unwrap().profile_id, "p-2");
    }

    #[tokio::test]
    async fn test_missing_credentials_is_auth_error_and_retryable_later() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            credentials: None,
            delay: Duration::ZERO,
        });
        let transport = Arc::new(ProfileTransport { calls: AtomicUsize::new(0) });
        let auth = manager(clock, Arc::clone(&source), transport);

        let err = auth.ensure_ready().await.unwrap_err();
        assert!(matches!(err, BridgeError::Auth { .. }));

        // The slot was cleared, so a second call starts a fresh bootstrap
        assert!(auth.ensure_ready().await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fast_path_and_expiry() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            credentials: Some(Credentials {
                token_data: token(&clock, chrono::Duration::minutes(10)),
                profile_data: Some(ProfilePayload::Single(ProfileData {
                    profile_id: "p".into(),
                    account_id: None,
                    is_selected: false,
                })),
            }),
            delay: Duration::ZERO,
        });
        let transport = Arc::new(ProfileTransport { calls: AtomicUsize::new(0) });
        let auth = manager(Arc::clone(&clock), Arc::clone(&source), transport);

        auth.ensure_ready().await.unwrap();
        auth.ensure_ready().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // Inside the 60s margin: the stub hands back the same stale token
        clock.advance(chrono::Duration::minutes(9) + chrono::Duration::seconds(30));
        assert!(!auth.is_ready().await);
        assert!(auth.ensure_ready().await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_bootstrap_and_persists() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            credentials: Some(Credentials {
                token_data: token(&clock, chrono::Duration::hours(1)),
                profile_data: Some(ProfilePayload::Single(ProfileData {
                    profile_id: "p".into(),
                    account_id: None,
                    is_selected: true,
                })),
            }),
            delay: Duration::ZERO,
        });
        let transport = Arc::new(ProfileTransport { calls: AtomicUsize::new(0) });
        let auth = manager(clock, Arc::clone(&source), transport);

        auth.ensure_ready().await.unwrap();
        auth.invalidate().await;
        assert!(!auth.is_ready().await);
        assert!(auth.snapshot().await.is_err());

        // Persisted token is expired too, so the scraper is asked again
        auth.ensure_ready().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sign_out_clears_state() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            credentials: Some(Credentials {
                token_data: token(&clock, chrono::Duration::hours(1)),
                profile_data: Some(ProfilePayload::Single(ProfileData {
                    profile_id: "p".into(),
                    account_id: None,
                    is_selected: true,
                })),
            }),
            delay: Duration::ZERO,
        });
        let transport = Arc::new(ProfileTransport { calls: AtomicUsize::new(0) });
        let auth = manager(clock, source, transport);

        auth.ensure_ready().await.unwrap();
        assert_eq!(auth.account_id().await.unwrap(), "acc-1");

        auth.sign_out().await.unwrap();
        assert!(!auth.is_ready().await);
        assert!(auth.account_id().await.is_err());
    }
}
