// WatchBridge - Streaming companion client core
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Playback stream lookup
//!
//! Served by a separate host (`ClientConfig::playback_base_url`), which
//! rejects the locale parameters. Stream tokens are short-lived, so nothing
//! here is cached. Decoding or DRM is not handled.

use crate::api::client::{segment, RequestOptions, StreamClient};
use crate::error::Result;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Manifest location and track info for one content id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStream {
    /// Manifest URL
    pub url: String,

    /// Stream session token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_locale: Option<String>,

    #[serde(default)]
    pub subtitles: Value,

    #[serde(default)]
    pub hard_subs: Value,

    #[serde(default)]
    pub versions: Value,
}

impl StreamClient {
    pub async fn get_playback_stream(&self, content_id: &str) -> Result<PlaybackStream> {
        let path = format!("/v1/{}/web/chrome/play", segment(content_id)?);
        let options = RequestOptions::new()
            .base_url(self.config().playback_base_url.clone())
            .skip_locale()
            .no_cache();
        self.request(Method::GET, &path, options).await
    }
}
