// WatchBridge - Streaming companion client core
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! TTL response cache
//!
//! Keys are `METHOD:full-url`, so two calls differing only in a query
//! parameter never share an entry. An entry is never returned once
//! `now >= expires_at`; expired entries are evicted lazily on access or by
//! an explicit [`RequestCache::cleanup`] pass, never by a background sweep.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub expires_at: DateTime<Utc>,
}

pub fn cache_key(method: &str, url: &str) -> String {
    format!("{}:{}", method, url)
}

#[derive(Debug)]
pub struct RequestCache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl<T: Clone> RequestCache<T> {
    pub fn new(clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Cached value, evicting it if it has expired
    pub async fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock().await;
        let now = self.clock.now();

        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.data.clone()),
            Some(_) => {
                entries.remove(key);
                debug!(key, "cache entry expired");
                None
            }
            None => None,
        }
    }

    /// Store `data`, replacing any previous entry
    pub async fn set(&self, key: &str, data: T, ttl: Duration) {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365));
        let entry = CacheEntry {
            data,
            expires_at: self.clock.now() + ttl,
        };
        self.entries.lock().await.insert(key.to_string(), entry);
    }

    /// Drop every entry whose key contains `fragment`
    ///
    /// Matching is by substring so a resource path such as
    /// `/{account}/watchlist` catches every list variant regardless of
    /// method, host and query string. Returns the number removed.
    pub async fn invalidate_by_prefix(&self, fragment: &str) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, _| !key.contains(fragment));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(fragment, removed, "cache invalidated");
        }
        removed
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Evict all expired entries now; returns how many were dropped
    pub async fn cleanup(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = self.clock.now();
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        before - entries.len()
    }

    /// Number of stored entries, expired or not
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache() -> (Arc<ManualClock>, RequestCache<String>) {
        let clock = Arc::new(ManualClock::default());
        let cache = RequestCache::new(clock.clone(), Duration::from_secs(300));
        (clock, cache)
    }

    #[tokio::test]
    async fn test_roundtrip_then_expiry() {
        let (clock, cache) = cache();
        let key = cache_key("GET", "https://svc.test/content/v2/discover/browse?n=20");

        cache.set(&key, "page".to_string(), Duration::from_secs(30 * 60)).await;
        assert_eq!(cache.get(&key).await.as_deref(), Some("page"));

        clock.advance(chrono::Duration::minutes(29));
        assert!(cache.get(&key).await.is_some());

        clock.advance(chrono::Duration::minutes(1));
        assert_eq!(cache.get(&key).await, None);
        // evicted lazily on that access
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_replaces_entry() {
        let (_clock, cache) = cache();
        cache.set("GET:a", "one".to_string(), Duration::from_secs(60)).await;
        cache.set("GET:a", "two".to_string(), Duration::from_secs(60)).await;
        assert_eq!(cache.get("GET:a").await.as_deref(), Some("two"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalidate_by_fragment() {
        let (_clock, cache) = cache();
        let ttl = Duration::from_secs(60);
        cache.set("GET:https://h/content/v2/discover/acc/watchlist?n=20", "a".into(), ttl).await;
        cache.set("GET:https://h/content/v2/discover/acc/watchlist?n=100", "b".into(), ttl).await;
        cache.set("GET:https://h/content/v2/discover/other/watchlist?n=20", "c".into(), ttl).await;
        cache.set("GET:https://h/content/v2/discover/browse", "d".into(), ttl).await;

        assert_eq!(cache.invalidate_by_prefix("/acc/watchlist").await, 2);
        assert_eq!(cache.len().await, 2);
        assert!(cache.get("GET:https://h/content/v2/discover/browse").await.is_some());
    }

    #[tokio::test]
    async fn test_cleanup_only_drops_expired() {
        let (clock, cache) = cache();
        cache.set("GET:short", "s".to_string(), Duration::from_secs(60)).await;
        cache.set("GET:long", "l".to_string(), Duration::from_secs(600)).await;

        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.cleanup().await, 1);
        assert_eq!(cache.get("GET:long").await.as_deref(), Some("l"));

        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
