// WatchBridge - Streaming companion client core
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Watch history and playheads
//!
//! Continue-watching reads the `watch-history` endpoint and falls back to
//! the older `discover/{account}/history` endpoint when the first one fails
//! or is empty. Both payloads are normalized into [`ContinueWatchingItem`],
//! so callers cannot tell which one answered.

use crate::api::auth::mask_id;
use crate::api::client::{segment, RequestOptions, StreamClient};
use crate::api::models::{string_at, value_at, ListResponse};
use crate::error::Result;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const CONTINUE_WATCHING_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// One partially watched item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueWatchingItem {
    pub content_id: String,
    pub series_id: Option<String>,
    pub title: Option<String>,
    pub series_title: Option<String>,
    pub season_number: Option<u64>,
    pub episode_number: Option<u64>,
    pub playhead_seconds: u64,
    pub duration_seconds: Option<u64>,
    pub fully_watched: bool,
    pub date_played: Option<String>,
    /// The item's panel as sent by the service
    pub panel: Value,
}

impl ContinueWatchingItem {
    /// Normalize one history entry; entries without any content id are dropped
    pub fn from_entry(entry: &Value) -> Option<Self> {
        let panel = entry.get("panel").cloned().unwrap_or(Value::Null);
        let content_id = string_at(&panel, &["id"])
            .or_else(|| string_at(entry, &["content_id"]))
            .or_else(|| string_at(entry, &["id"]))?;
        let episode = |key: &str| value_at(&panel, &["episode_metadata", key]);

        Some(Self {
            content_id,
            series_id: string_at(&panel, &["episode_metadata", "series_id"])
                .or_else(|| string_at(entry, &["parent_id"])),
            title: string_at(&panel, &["title"]),
            series_title: string_at(&panel, &["episode_metadata", "series_title"]),
            season_number: episode("season_number").and_then(Value::as_u64),
            episode_number: episode("episode_number").and_then(Value::as_u64),
            playhead_seconds: entry.get("playhead").and_then(Value::as_u64).unwrap_or(0),
            duration_seconds: episode("duration_ms").and_then(Value::as_u64).map(|ms| ms / 1000),
            fully_watched: entry
                .get("fully_watched")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            date_played: string_at(entry, &["date_played"]),
            panel,
        })
    }
}

fn normalize_history(raw: ListResponse) -> ListResponse<ContinueWatchingItem> {
    let dropped = raw.data.len();
    let data: Vec<ContinueWatchingItem> = raw
        .data
        .iter()
        .filter_map(ContinueWatchingItem::from_entry)
        .collect();
    if data.len() < dropped {
        debug!(dropped = dropped - data.len(), "history entries without content id");
    }

    ListResponse {
        total: raw.total.max(data.len() as u64),
        data,
        meta: raw.meta,
    }
}

/// Resume position of one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playhead {
    pub content_id: String,
    #[serde(default)]
    pub playhead: u64,
    #[serde(default)]
    pub fully_watched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayheadsResponse {
    #[serde(default)]
    data: Vec<Playhead>,
}

impl StreamClient {
    /// Items the account has started but not finished
    pub async fn get_continue_watching(&self, limit: u32) -> Result<ListResponse<ContinueWatchingItem>> {
        let account = self.account_id().await?;
        let account_segment = segment(&account)?;

        let primary_path = format!("/content/v2/{}/watch-history", account_segment);
        let primary = self
            .request::<Value>(
                Method::GET,
                &primary_path,
                RequestOptions::new()
                    .param("page_size", limit)
                    .cache_ttl(CONTINUE_WATCHING_CACHE_TTL),
            )
            .await
            .and_then(ListResponse::from_raw)
            .map(normalize_history);

        if matches!(primary, Ok(ref list) if !list.is_empty()) {
            return primary;
        }
        let primary_empty = primary.is_ok();
        match primary {
            Ok(_) => debug!(account = %mask_id(&account), "watch history empty, trying legacy history"),
            Err(ref e) => {
                warn!(account = %mask_id(&account), error = %e, "watch history failed, trying legacy history")
            }
        }

        let legacy_path = format!("/content/v2/discover/{}/history", account_segment);
        let legacy = self
            .request::<Value>(
                Method::GET,
                &legacy_path,
                RequestOptions::new()
                    .param("page_size", limit)
                    .cache_ttl(CONTINUE_WATCHING_CACHE_TTL),
            )
            .await
            .and_then(ListResponse::from_raw)
            .map(normalize_history);

        match legacy {
            Err(e) if primary_empty => {
                warn!(error = %e, "legacy history failed");
                primary
            }
            legacy => legacy,
        }
    }

    /// Playheads for `content_ids`, keyed by content id
    ///
    /// An empty id list is answered without touching the network.
    pub async fn get_playheads(&self, content_ids: &[&str]) -> Result<HashMap<String, Playhead>> {
        let ids: Vec<&str> = content_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let account = self.account_id().await?;
        let path = format!("/content/v2/{}/playheads", segment(&account)?);
        let response: PlayheadsResponse = self
            .request(
                Method::GET,
                &path,
                RequestOptions::new().param("content_ids", ids.join(",")).no_cache(),
            )
            .await?;

        Ok(response
            .data
            .into_iter()
            .map(|p| (p.content_id.clone(), p))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_watch_history_entry() {
        let entry = json!({
            "id": "E1",
            "playhead": 312,
            "fully_watched": false,
            "date_played": "2025-01-02T10:00:00Z",
            "panel": {
                "id": "E1",
                "title": "The Journey's End",
                "episode_metadata": {
                    "series_id": "S1",
                    "series_title": "Frieren",
                    "season_number": 1,
                    "episode_number": 1,
                    "duration_ms": 1_440_000
                }
            }
        });
        let item = ContinueWatchingItem::from_entry(&entry).unwrap();
        assert_eq!(item.content_id, "E1");
        assert_eq!(item.series_id.as_deref(), Some("S1"));
        assert_eq!(item.playhead_seconds, 312);
        assert_eq!(item.duration_seconds, Some(1440));
        assert_eq!(item.episode_number, Some(1));
    }

    #[test]
    fn test_legacy_entry_uses_parent_id() {
        let entry = json!({"content_id": "E9", "parent_id": "S9", "fully_watched": true});
        let item = ContinueWatchingItem::from_entry(&entry).unwrap();
        assert_eq!(item.content_id, "E9");
        assert_eq!(item.series_id.as_deref(), Some("S9"));
        assert!(item.fully_watched);
        assert_eq!(item.panel, Value::Null);
    }

    #[test]
    fn test_entries_without_id_are_dropped() {
        let raw = ListResponse::new(vec![json!({"playhead": 3}), json!({"id": "E2"})]);
        let list = normalize_history(raw);
        assert_eq!(list.len(), 1);
        assert_eq!(list.data[0].content_id, "E2");
    }

    #[test]
    fn test_playheads_parse() {
        let raw = r#"{"data":[{"content_id":"E1","playhead":42,"fully_watched":false}],"total":1}"#;
        let parsed: PlayheadsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data[0].playhead, 42);
        assert!(parsed.data[0].last_modified.is_none());
    }
}
