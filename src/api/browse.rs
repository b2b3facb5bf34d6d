// WatchBridge - Streaming companion client core
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Discovery: browse, search, up-next, home feed, recommendations
//!
//! # Endpoints
//! - `GET /content/v2/discover/browse`
//! - `GET /content/v2/discover/search`
//! - `GET /content/v2/discover/up_next/{contentId}`
//! - `GET /content/v2/discover/{account}/home_feed`
//! - `GET /content/v2/discover/{account}/similar_to/{seedId}`
//!
//! Recommendations have no single endpoint. [`StreamClient::get_recommendations`]
//! walks three tiers (seeded similar-to, a recommendation lane of the home
//! feed, popular browse) and stops at the first one with items. The lane
//! match in the second tier is a heuristic over lane id, title and type; it
//! has no contract with the service and may stop matching at any time.

use crate::api::client::{segment, RequestOptions, StreamClient};
use crate::api::history::ContinueWatchingItem;
use crate::api::models::{first_data_item, ListResponse};
use crate::error::Result;
use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Semi-static listings
const BROWSE_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

const SEARCH_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

const HOME_FEED_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Page size of the home feed scanned for a recommendation lane
const HOME_FEED_SCAN_SIZE: u32 = 50;

/// Keys under which a home feed lane carries its items, in lookup order
const LANE_ITEM_KEYS: &[&str] = &["items", "panels", "collection_items"];

/// Lane fields inspected by the recommendation match
const LANE_NAME_KEYS: &[&str] = &["id", "title", "response_type", "resource_type", "type"];

lazy_static::lazy_static! {
    static ref RECOMMENDATION_LANE: Regex =
        Regex::new(r"(?i)recommend|for[_ ]you|because[_ ]you|you[_ ]might[_ ]like").unwrap();
}

/// Filters for [`StreamClient::browse`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseOptions {
    /// Page size (`n`)
    pub limit: Option<u32>,
    pub start: Option<u32>,
    /// `series` or `movie_listing`
    pub content_type: Option<String>,
    pub categories: Vec<String>,
    /// e.g. `winter-2025`
    pub seasonal_tag: Option<String>,
    pub is_dubbed: Option<bool>,
    pub is_subbed: Option<bool>,
    /// `popularity`, `newly_added`, `alphabetical`
    pub sort_by: Option<String>,
    pub include_ratings: bool,
}

impl BrowseOptions {
    fn to_request(&self) -> RequestOptions {
        let categories = (!self.categories.is_empty()).then(|| self.categories.join(","));
        RequestOptions::new()
            .opt_param("n", self.limit)
            .opt_param("start", self.start)
            .opt_param("type", self.content_type.as_deref())
            .opt_param("categories", categories)
            .opt_param("seasonal_tag", self.seasonal_tag.as_deref())
            .opt_param("is_dubbed", self.is_dubbed)
            .opt_param("is_subbed", self.is_subbed)
            .opt_param("sort_by", self.sort_by.as_deref())
            .opt_param("ratings", self.include_ratings.then_some(true))
            .cache_ttl(BROWSE_CACHE_TTL)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub limit: Option<u32>,
    pub start: Option<u32>,
    /// Keep only result buckets of this type (`series`, `episode`, ...)
    pub content_type: Option<String>,
}

/// Options for the home screen fan-out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeOptions {
    /// Items per lane
    pub limit: u32,
    /// Defaults to the current season
    pub seasonal_tag: Option<String>,
}

impl Default for HomeOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            seasonal_tag: None,
        }
    }
}

/// Everything the home screen shows, one lane per leg
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeData {
    pub continue_watching: ListResponse<ContinueWatchingItem>,
    pub recommendations: ListResponse,
    pub popular: ListResponse,
    pub seasonal: ListResponse,
}

/// Seasonal tag for a date: `winter` Jan–Mar, `spring` Apr–Jun,
/// `summer` Jul–Sep, `fall` Oct–Dec
pub fn seasonal_tag_for(date: DateTime<Utc>) -> String {
    let season = match date.month() {
        1..=3 => "winter",
        4..=6 => "spring",
        7..=9 => "summer",
        _ => "fall",
    };
    format!("{}-{}", season, date.year())
}

/// True when a home feed lane looks like a recommendation lane
pub fn is_recommendation_lane(lane: &Value) -> bool {
    LANE_NAME_KEYS
        .iter()
        .filter_map(|key| lane.get(*key).and_then(Value::as_str))
        .any(|name| RECOMMENDATION_LANE.is_match(name))
}

/// Items of the first recommendation lane with any
fn recommendation_lane_items(feed: &ListResponse) -> Vec<Value> {
    feed.data
        .iter()
        .filter(|lane| is_recommendation_lane(lane))
        .find_map(|lane| {
            LANE_ITEM_KEYS
                .iter()
                .filter_map(|key| lane.get(*key).and_then(Value::as_array))
                .find(|items| !items.is_empty())
                .cloned()
        })
        .unwrap_or_default()
}

/// Merge the per-type buckets of a search response into one list
fn flatten_search(raw: Value, content_type: Option<&str>) -> Result<ListResponse> {
    let buckets = ListResponse::from_raw(raw)?;
    let data: Vec<Value> = buckets
        .data
        .into_iter()
        .filter(|bucket| match content_type {
            Some(wanted) => bucket.get("type").and_then(Value::as_str) == Some(wanted),
            None => true,
        })
        .flat_map(|bucket| match bucket {
            Value::Object(mut obj) => match obj.remove("items") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        })
        .collect();

    Ok(ListResponse {
        total: data.len() as u64,
        data,
        meta: buckets.meta,
    })
}

impl StreamClient {
    /// Browse the catalog with filters
    pub async fn browse(&self, options: &BrowseOptions) -> Result<ListResponse> {
        let raw: Value = self
            .request(Method::GET, "/content/v2/discover/browse", options.to_request())
            .await?;
        ListResponse::from_raw(raw)
    }

    /// Search all content types; the per-type buckets are flattened
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<ListResponse> {
        let request = RequestOptions::new()
            .param("q", query.trim())
            .opt_param("n", options.limit)
            .opt_param("start", options.start)
            .opt_param("type", options.content_type.as_deref())
            .cache_ttl(SEARCH_CACHE_TTL);
        let raw: Value = self
            .request(Method::GET, "/content/v2/discover/search", request)
            .await?;
        flatten_search(raw, options.content_type.as_deref())
    }

    /// Next episode after `content_id`, `None` when there is none
    pub async fn get_up_next(&self, content_id: &str) -> Result<Option<Value>> {
        let path = format!("/content/v2/discover/up_next/{}", segment(content_id)?);
        match self
            .request::<Value>(Method::GET, &path, RequestOptions::new().no_cache())
            .await
        {
            Ok(raw) => Ok(first_data_item(raw)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Lanes of the account's home feed
    pub async fn get_home_feed(&self, limit: u32, start: u32) -> Result<ListResponse> {
        let account = self.account_id().await?;
        let path = format!("/content/v2/discover/{}/home_feed", segment(&account)?);
        let request = RequestOptions::new()
            .param("n", limit)
            .param("start", start)
            .cache_ttl(HOME_FEED_CACHE_TTL);
        let raw: Value = self.request(Method::GET, &path, request).await?;
        ListResponse::from_raw(raw)
    }

    /// Recommendations, from the first tier that produces items
    ///
    /// 1. `similar_to/{seed}` when a seed is given
    /// 2. a recommendation lane of the home feed
    /// 3. popular titles from browse
    ///
    /// Tier failures are logged; when every tier fails or comes back empty
    /// the result is an empty list.
    ///
    /// # Errors
    /// Only when credentials cannot be made ready.
    pub async fn get_recommendations(&self, seed_id: Option<&str>, limit: u32) -> Result<ListResponse> {
        let account = self.account_id().await?;

        if let Some(seed) = seed_id.filter(|s| !s.trim().is_empty()) {
            match self.similar_to(&account, seed, limit).await {
                Ok(list) if !list.is_empty() => return Ok(list),
                Ok(_) => debug!("no similar titles for seed"),
                Err(e) => warn!(error = %e, "similar-to recommendations failed"),
            }
        }

        match self.get_home_feed(HOME_FEED_SCAN_SIZE, 0).await {
            Ok(feed) => {
                let mut items = recommendation_lane_items(&feed);
                if !items.is_empty() {
                    items.truncate(limit as usize);
                    return Ok(ListResponse::new(items));
                }
                debug!(lanes = feed.len(), "home feed has no recommendation lane");
            }
            Err(e) => warn!(error = %e, "home feed recommendations failed"),
        }

        let popular = BrowseOptions {
            limit: Some(limit),
            sort_by: Some("popularity".to_string()),
            ..Default::default()
        };
        match self.browse(&popular).await {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!(error = %e, "popular browse fallback failed");
                Ok(ListResponse::default())
            }
        }
    }

    async fn similar_to(&self, account: &str, seed: &str, limit: u32) -> Result<ListResponse> {
        let path = format!(
            "/content/v2/discover/{}/similar_to/{}",
            segment(account)?,
            segment(seed)?
        );
        let raw: Value = self
            .request(Method::GET, &path, RequestOptions::new().param("n", limit))
            .await?;
        ListResponse::from_raw(raw)
    }

    /// Home screen fan-out: continue watching, recommendations, popular and
    /// the current season, fetched concurrently
    ///
    /// A failing leg is logged and left empty; this never fails as a whole.
    pub async fn get_home_data(&self, options: &HomeOptions) -> HomeData {
        let seasonal_tag = options
            .seasonal_tag
            .clone()
            .unwrap_or_else(|| seasonal_tag_for(self.now()));
        let popular = BrowseOptions {
            limit: Some(options.limit),
            sort_by: Some("popularity".to_string()),
            ..Default::default()
        };
        let seasonal = BrowseOptions {
            limit: Some(options.limit),
            seasonal_tag: Some(seasonal_tag),
            ..Default::default()
        };

        let (continue_watching, recommendations, popular, seasonal) = tokio::join!(
            self.get_continue_watching(options.limit),
            self.get_recommendations(None, options.limit),
            self.browse(&popular),
            self.browse(&seasonal),
        );

        HomeData {
            continue_watching: or_default("continue watching", continue_watching),
            recommendations: or_default("recommendations", recommendations),
            popular: or_default("popular", popular),
            seasonal: or_default("seasonal", seasonal),
        }
    }
}

/// Fan-out leg result, defaulted and logged on failure
pub(crate) fn or_default<T: Default>(leg: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        warn!(leg, error = %e, "fan-out leg failed");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_seasonal_tag_boundaries() {
        let at = |m, d| Utc.with_ymd_and_hms(2025, m, d, 12, 0, 0).unwrap();
        assert_eq!(seasonal_tag_for(at(1, 1)), "winter-2025");
        assert_eq!(seasonal_tag_for(at(3, 31)), "winter-2025");
        assert_eq!(seasonal_tag_for(at(4, 1)), "spring-2025");
        assert_eq!(seasonal_tag_for(at(9, 30)), "summer-2025");
        assert_eq!(seasonal_tag_for(at(12, 31)), "fall-2025");
    }

    #[test]
    fn test_browse_params_in_fixed_order() {
        let options = BrowseOptions {
            limit: Some(20),
            content_type: Some("series".into()),
            categories: vec!["action".into(), "drama".into()],
            seasonal_tag: Some("winter-2025".into()),
            is_dubbed: Some(true),
            include_ratings: true,
            ..Default::default()
        };
        let request = options.to_request();
        let params: Vec<(&str, &str)> = request
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            params,
            vec![
                ("n", "20"),
                ("type", "series"),
                ("categories", "action,drama"),
                ("seasonal_tag", "winter-2025"),
                ("is_dubbed", "true"),
                ("ratings", "true"),
            ]
        );
        assert_eq!(request.cache_ttl, Some(BROWSE_CACHE_TTL));
    }

    #[test]
    fn test_recommendation_lane_heuristic() {
        assert!(is_recommendation_lane(&json!({"response_type": "recommendations"})));
        assert!(is_recommendation_lane(&json!({"title": "Because You Watched Frieren"})));
        assert!(is_recommendation_lane(&json!({"id": "for_you_lane"})));
        assert!(!is_recommendation_lane(&json!({"title": "Continue Watching", "id": 3})));
    }

    #[test]
    fn test_lane_items_skip_empty_lanes() {
        let feed = ListResponse::new(vec![
            json!({"title": "New", "items": [{"id": "x"}]}),
            json!({"title": "Recommended", "items": []}),
            json!({"title": "Recommended for you", "panels": [{"id": "a"}, {"id": "b"}]}),
        ]);
        let items = recommendation_lane_items(&feed);
        assert_eq!(items, vec![json!({"id": "a"}), json!({"id": "b"})]);
    }

    #[test]
    fn test_flatten_search_buckets() {
        let raw = json!({
            "data": [
                {"type": "series", "count": 2, "items": [{"id": "s1"}, {"id": "s2"}]},
                {"type": "episode", "count": 1, "items": [{"id": "e1"}]},
                {"type": "top_results", "count": 0}
            ],
            "total": 3,
            "meta": {"q": "x"}
        });
        let all = flatten_search(raw.clone(), None).unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.meta["q"], "x");

        let episodes = flatten_search(raw, Some("episode")).unwrap();
        assert_eq!(episodes.data, vec![json!({"id": "e1"})]);
    }
}
