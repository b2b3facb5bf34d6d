// WatchBridge - Streaming companion client core
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Series, seasons and episodes (CMS endpoints)

use crate::api::browse::or_default;
use crate::api::client::{segment, RequestOptions, StreamClient};
use crate::api::models::{first_data_item, ListResponse};
use crate::error::Result;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// CMS data changes rarely
const CMS_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Series page data from three concurrent lookups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesWithSeasons {
    pub series: Option<Value>,
    pub seasons: ListResponse,
    pub is_in_watchlist: bool,
}

impl StreamClient {
    pub async fn get_series(&self, series_id: &str) -> Result<Option<Value>> {
        let path = format!("/content/v2/cms/series/{}/", segment(series_id)?);
        let raw: Value = self
            .request(Method::GET, &path, RequestOptions::new().cache_ttl(CMS_CACHE_TTL))
            .await?;
        Ok(first_data_item(raw))
    }

    pub async fn get_seasons(&self, series_id: &str) -> Result<ListResponse> {
        let path = format!("/content/v2/cms/series/{}/seasons", segment(series_id)?);
        let raw: Value = self
            .request(Method::GET, &path, RequestOptions::new().cache_ttl(CMS_CACHE_TTL))
            .await?;
        ListResponse::from_raw(raw)
    }

    pub async fn get_episodes(&self, season_id: &str) -> Result<ListResponse> {
        let path = format!("/content/v2/cms/seasons/{}/episodes", segment(season_id)?);
        let raw: Value = self
            .request(Method::GET, &path, RequestOptions::new().cache_ttl(CMS_CACHE_TTL))
            .await?;
        ListResponse::from_raw(raw)
    }

    /// Series detail, its seasons and watchlist membership, concurrently
    ///
    /// Each leg fails on its own: a failed leg is logged and replaced with
    /// `None`, an empty list or `false`.
    pub async fn get_series_with_seasons(&self, series_id: &str) -> SeriesWithSeasons {
        let (series, seasons, is_in_watchlist) = tokio::join!(
            self.get_series(series_id),
            self.get_seasons(series_id),
            self.is_in_watchlist(series_id),
        );

        SeriesWithSeasons {
            series: or_default("series", series),
            seasons: or_default("seasons", seasons),
            is_in_watchlist: or_default("watchlist membership", is_in_watchlist),
        }
    }
}
