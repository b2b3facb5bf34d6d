// WatchBridge - Streaming companion client core
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Key/value stores
//!
//! Two scopes exist: a session-scoped store that lives as long as the
//! process ([`MemoryStore`]) and an extension-scoped store that survives
//! restarts ([`SqliteStore`]). Values are opaque strings, JSON in practice.

use crate::error::Result;
use crate::storage::database::Database;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// Process-lifetime store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// SQLite-backed store, one `scope` per logical store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
    scope: String,
}

impl SqliteStore {
    pub fn new<S: Into<String>>(db: Database, scope: S) -> Self {
        Self {
            db,
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM kv_store WHERE scope = ? AND key = ?")
                .bind(&self.scope)
                .bind(key)
                .fetch_optional(self.db.pool())
                .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (scope, key, value) VALUES (?, ?, ?)
            ON CONFLICT(scope, key) DO UPDATE SET
                value = excluded.value,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&self.scope)
        .bind(key)
        .bind(value)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE scope = ? AND key = ?")
            .bind(&self.scope)
            .bind(key)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }
}
