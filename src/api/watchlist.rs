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


//! Watchlist
//!
//! # Endpoints
//! - `GET /content/v2/discover/{account}/watchlist` (list)
//! - `POST /content/v2/{account}/watchlist` (add, body `{"content_id": …}`)
//! - `DELETE /content/v2/{account}/watchlist/{contentId}` (remove)
//!
//! # Idempotency
//! Adding something already on the list answers 409; that is reported as
//! success with `alreadyInHash: true`. Removing something not on the list
//! answers 404; that is reported as plain success.
//!
//! Both mutations drop every cached list for the account before returning,
//! whatever the outcome, so the next read goes to the service.
//!
//! # Membership
//! The service cannot filter the list by content id, so membership is a
//! client-side scan over the most recently updated entries. Entries carry
//! the series id under different keys depending on how they were added;
//! [`WATCHLIST_ID_PATHS`] lists them in the order they are checked. Nothing
//! guarantees that one of them is always present.

use crate::api::auth::mask_id;
use crate::api::client::{segment, RequestOptions, StreamClient};
use crate::api::models::{string_at, ListResponse, MutationResult};
use crate::error::Result;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const WATCHLIST_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Key paths that may hold an entry's series id, checked in order
pub const WATCHLIST_ID_PATHS: &[&[&str]] = &[
    &["id"],
    &["content_id"],
    &["panel", "episode_metadata", "series_id"],
    &["panel", "id"],
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistOptions {
    pub limit: u32,
    pub start: Option<u32>,
    /// `date_updated`, `date_watched`, `date_added`, `alphabetical`
    pub sort_by: Option<String>,
    /// `asc` or `desc`
    pub order: Option<String>,
}

impl Default for WatchlistOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            start: None,
            sort_by: None,
            order: None,
        }
    }
}

/// True when any documented key path of `entry` equals `content_id`
pub fn entry_matches(entry: &Value, content_id: &str) -> bool {
    WATCHLIST_ID_PATHS
        .iter()
        .any(|path| string_at(entry, path).as_deref() == Some(content_id))
}

impl StreamClient {
    pub async fn get_watchlist(&self, options: &WatchlistOptions) -> Result<ListResponse> {
        let account = self.account_id().await?;
        let request = RequestOptions::new()
            .param("n", options.limit)
            .opt_param("start", options.start)
            .opt_param("sort_by", options.sort_by.as_deref())
            .opt_param("order", options.order.as_deref())
            .cache_ttl(WATCHLIST_CACHE_TTL);
        let raw: Value = self
            .request(Method::GET, &list_path(&account)?, request)
            .await?;
        ListResponse::from_raw(raw)
    }

    /// Whether `content_id` is on the watchlist, never served from cache
    pub async fn is_in_watchlist(&self, content_id: &str) -> Result<bool> {
        let content_id = content_id.trim();
        let account = self.account_id().await?;
        let request = RequestOptions::new()
            .param("n", self.config().watchlist_scan_size)
            .param("sort_by", "date_updated")
            .param("order", "desc")
            .no_cache();
        let raw: Value = self
            .request(Method::GET, &list_path(&account)?, request)
            .await?;

        let found = ListResponse::from_raw(raw)?
            .data
            .iter()
            .any(|entry| entry_matches(entry, content_id));
        debug!(content_id, found, "watchlist membership scan");
        Ok(found)
    }

    /// Add to the watchlist; already present counts as success
    pub async fn add_to_watchlist(&self, content_id: &str) -> MutationResult {
        let account = match self.account_id().await {
            Ok(account) => account,
            Err(e) => return MutationResult::failed(&e),
        };

        let result = match (segment(&account), segment(content_id)) {
            (Ok(account_segment), Ok(_)) => {
                self.request::<Value>(
                    Method::POST,
                    &format!("/content/v2/{}/watchlist", account_segment),
                    RequestOptions::new().body(json!({ "content_id": content_id.trim() })),
                )
                .await
            }
            (Err(e), _) | (_, Err(e)) => Err(e),
        };
        self.invalidate_watchlist(&account).await;

        match result {
            Ok(_) => {
                info!(content_id, "added to watchlist");
                MutationResult::ok()
            }
            Err(e) if e.is_conflict() => {
                debug!(content_id, "already on watchlist");
                MutationResult::already_present()
            }
            Err(e) => {
                warn!(content_id, error = %e, "watchlist add failed");
                MutationResult::failed(&e)
            }
        }
    }

    /// Remove from the watchlist; already absent counts as success
    pub async fn remove_from_watchlist(&self, content_id: &str) -> MutationResult {
        let account = match self.account_id().await {
            Ok(account) => account,
            Err(e) => return MutationResult::failed(&e),
        };

        let result = match (segment(&account), segment(content_id)) {
            (Ok(account_segment), Ok(id_segment)) => {
                self.request::<Value>(
                    Method::DELETE,
                    &format!("/content/v2/{}/watchlist/{}", account_segment, id_segment),
                    RequestOptions::new(),
                )
                .await
            }
            (Err(e), _) | (_, Err(e)) => Err(e),
        };
        self.invalidate_watchlist(&account).await;

        match result {
            Ok(_) => {
                info!(content_id, "removed from watchlist");
                MutationResult::ok()
            }
            Err(e) if e.is_not_found() => {
                debug!(content_id, "not on watchlist");
                MutationResult::ok()
            }
            Err(e) => {
                warn!(content_id, error = %e, "watchlist remove failed");
                MutationResult::failed(&e)
            }
        }
    }

    async fn invalidate_watchlist(&self, account: &str) {
        let fragment = format!("/{}/watchlist", urlencoding::encode(account));
        let removed = self.invalidate(&fragment).await;
        debug!(account = %mask_id(account), removed, "watchlist cache invalidated");
    }
}

fn list_path(account: &str) -> Result<String> {
    Ok(format!("/content/v2/discover/{}/watchlist", segment(account)?))
}
