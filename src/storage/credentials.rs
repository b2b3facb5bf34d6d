// WatchBridge - Streaming companion client core
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Credential persistence
//!
//! Token, profile and locale are stored under distinct keys in both the
//! session-scoped and the extension-scoped store. Reads prefer the session
//! store and fall back to the extension store. No logic lives here.

use crate::api::auth::{ProfileData, TokenData};
use crate::error::{BridgeError, Result};
use crate::storage::kv::{KeyValueStore, MemoryStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

pub const TOKEN_KEY: &str = "watchbridge.token";
pub const PROFILE_KEY: &str = "watchbridge.profile";
pub const LOCALE_KEY: &str = "watchbridge.locale";

/// Everything a previous bootstrap left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedCredentials {
    pub token: Option<TokenData>,
    pub profile: Option<ProfileData>,
    pub locale: Option<String>,
}

#[derive(Clone)]
pub struct CredentialStore {
    session: Arc<dyn KeyValueStore>,
    extension: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    pub fn new(session: Arc<dyn KeyValueStore>, extension: Arc<dyn KeyValueStore>) -> Self {
        Self { session, extension }
    }

    /// Both scopes in memory; nothing survives the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    pub async fn load(&self) -> Result<PersistedCredentials> {
        Ok(PersistedCredentials {
            token: self.read_json(TOKEN_KEY).await?,
            profile: self.read_json(PROFILE_KEY).await?,
            locale: self.read(LOCALE_KEY).await?,
        })
    }

    pub async fn save_token(&self, token: &TokenData) -> Result<()> {
        self.write_json(TOKEN_KEY, token).await
    }

    pub async fn save_profile(&self, profile: &ProfileData) -> Result<()> {
        self.write_json(PROFILE_KEY, profile).await
    }

    pub async fn save_locale(&self, locale: &str) -> Result<()> {
        self.write(LOCALE_KEY, locale).await
    }

    pub async fn clear(&self) -> Result<()> {
        for key in [TOKEN_KEY, PROFILE_KEY, LOCALE_KEY] {
            self.session.remove(key).await?;
            self.extension.remove(key).await?;
        }
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.session.get(key).await? {
            return Ok(Some(value));
        }
        self.extension.get(key).await
    }

    /// Corrupt entries are logged and treated as absent
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.read(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "ignoring corrupt persisted value");
                Ok(None)
            }
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.session.set(key, value).await?;
        self.extension.set(key, value).await
    }

    async fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| BridgeError::StorageError(format!("Failed to encode {}: {}", key, e)))?;
        self.write(key, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;
    use crate::storage::kv::SqliteStore;
    use chrono::{TimeZone, Utc};

    fn token() -> TokenData {
        TokenData {
            access_token: "tok".to_string(),
            account_id: Some("acc".to_string()),
            expires_at: Utc.timestamp_millis_opt(1_767_225_600_000).unwrap(),
            country: Some("US".to_string()),
        }
    }

    #[tokio::test]
    async fn test_save_writes_both_scopes() {
        let session = Arc::new(MemoryStore::new());
        let extension = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(session.clone(), extension.clone());

        store.save_token(&token()).await.unwrap();
        store.save_locale("en-US").await.unwrap();

        assert!(session.get(TOKEN_KEY).await.unwrap().is_some());
        assert!(extension.get(TOKEN_KEY).await.unwrap().is_some());
        assert_eq!(extension.get(LOCALE_KEY).await.unwrap().as_deref(), Some("en-US"));
    }

    #[tokio::test]
    async fn test_load_prefers_session_then_extension() {
        let session = Arc::new(MemoryStore::new());
        let extension = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(session.clone(), extension.clone());

        extension.set(LOCALE_KEY, "de-DE").await.unwrap();
        extension
            .set(PROFILE_KEY, r#"{"profileId":"ext"}"#)
            .await
            .unwrap();
        session
            .set(PROFILE_KEY, r#"{"profileId":"sess"}"#)
            .await
            .unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.profile.unwrap().profile_id, "sess");
        assert_eq!(loaded.locale.as_deref(), Some("de-DE"));
        assert!(loaded.token.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_ignored() {
        let session = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(session.clone(), Arc::new(MemoryStore::new()));

        session.set(TOKEN_KEY, "{not json").await.unwrap();
        assert_eq!(store.load().await.unwrap().token, None);
    }

    #[tokio::test]
    async fn test_sqlite_extension_scope_roundtrip_and_clear() {
        let db = Database::new_in_memory().await.unwrap();
        let store = CredentialStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SqliteStore::new(db.clone(), "extension")),
        );
        store.save_token(&token()).await.unwrap();

        // A fresh session scope still finds the durable copy
        let reopened = CredentialStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SqliteStore::new(db, "extension")),
        );
        assert_eq!(reopened.load().await.unwrap().token, Some(token()));

        reopened.clear().await.unwrap();
        assert_eq!(reopened.load().await.unwrap(), PersistedCredentials::default());
    }
}
