// WatchBridge - Streaming companion client core
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Account profiles
//!
//! Used in two places: by the auth bootstrap when the host page supplied a
//! token but no profile id (before the client is ready, so it talks to the
//! transport directly), and by [`StreamClient::get_profile`].

use crate::api::auth::{select_profile, ProfileData};
use crate::api::client::{RequestOptions, StreamClient};
use crate::api::transport::{HttpRequest, Transport};
use crate::error::{BridgeError, Result};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::Deserialize;
use url::Url;

pub const MULTIPROFILE_PATH: &str = "/accounts/v1/me/multiprofile";

#[derive(Debug, Deserialize)]
struct MultiprofileResponse {
    #[serde(default)]
    profiles: Vec<ProfileData>,
}

fn parse_profiles(body: &str) -> Result<Vec<ProfileData>> {
    let parsed: MultiprofileResponse = serde_json::from_str(body).map_err(|e| {
        BridgeError::invalid_response(
            format!("multiprofile: {}", e),
            Some(body.chars().take(200).collect()),
        )
    })?;
    Ok(parsed.profiles)
}

/// Fetch all profiles of the token's account
///
/// # Errors
/// `Http` on a non-2xx answer, `InvalidApiResponse` on an unexpected body
pub async fn fetch_profiles(
    transport: &dyn Transport,
    base_url: &str,
    access_token: &str,
) -> Result<Vec<ProfileData>> {
    let url = Url::parse(&format!("{}{}", base_url.trim_end_matches('/'), MULTIPROFILE_PATH))?;
    let mut request = HttpRequest::new(Method::GET, url);
    request.headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", access_token))
            .map_err(|e| BridgeError::InvalidInput(format!("Invalid access token: {}", e)))?,
    );

    let response = transport.send(request).await?;
    if !response.is_success() {
        return Err(BridgeError::http(
            response.status,
            "profile lookup failed",
            Some(MULTIPROFILE_PATH.to_string()),
        ));
    }

    parse_profiles(&response.body)
}

impl StreamClient {
    /// The selected profile, or the first one if none is selected
    pub async fn get_profile(&self) -> Result<Option<ProfileData>> {
        let response: MultiprofileResponse = self
            .request(
                Method::GET,
                MULTIPROFILE_PATH,
                RequestOptions::new().no_cache().skip_locale(),
            )
            .await?;
        Ok(select_profile(response.profiles))
    }
}
