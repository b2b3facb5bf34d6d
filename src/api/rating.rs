// WatchBridge - Streaming companion client core
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! User ratings
//!
//! `/content-reviews/v3/user/{account}/rating/{type}/{id}`, never cached.
//! A missing rating is a 404 and reads as `None`.

use crate::api::client::{segment, RequestOptions, StreamClient};
use crate::api::models::MutationResult;
use crate::error::{BridgeError, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// What kind of content a rating is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatedContent {
    Series,
    Episode,
    MovieListing,
}

impl RatedContent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatedContent::Series => "series",
            RatedContent::Episode => "episode",
            RatedContent::MovieListing => "movie_listing",
        }
    }
}

impl fmt::Display for RatedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RatedContent {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "series" => Ok(RatedContent::Series),
            "episode" => Ok(RatedContent::Episode),
            "movie_listing" | "movie" => Ok(RatedContent::MovieListing),
            other => Err(BridgeError::InvalidInput(format!("unknown content type '{}'", other))),
        }
    }
}

fn rating_path(account: &str, content_type: RatedContent, content_id: &str) -> Result<String> {
    Ok(format!(
        "/content-reviews/v3/user/{}/rating/{}/{}",
        segment(account)?,
        content_type,
        segment(content_id)?
    ))
}

impl StreamClient {
    pub async fn get_user_rating(&self, content_type: RatedContent, content_id: &str) -> Result<Option<Value>> {
        let account = self.account_id().await?;
        let path = rating_path(&account, content_type, content_id)?;
        match self
            .request::<Value>(Method::GET, &path, RequestOptions::new().no_cache())
            .await
        {
            Ok(Value::Null) => Ok(None),
            Ok(rating) => Ok(Some(rating)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set the user's rating (`"1s"`..`"5s"` for series, `"up"`/`"down"` for
    /// episodes)
    ///
    /// Cached series detail is left alone; the aggregate rating is not
    /// expected to change synchronously.
    pub async fn update_user_rating(
        &self,
        content_type: RatedContent,
        content_id: &str,
        rating: &str,
    ) -> MutationResult {
        let rating = rating.trim();
        if rating.is_empty() {
            return MutationResult::failed(&BridgeError::InvalidInput("rating must not be empty".to_string()));
        }

        let result = match self.account_id().await {
            Ok(account) => match rating_path(&account, content_type, content_id) {
                Ok(path) => {
                    self.request::<Value>(Method::PUT, &path, RequestOptions::new().body(json!({ "rating": rating })))
                        .await
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => {
                debug!(content_id, %content_type, rating, "rating updated");
                MutationResult::ok()
            }
            Err(e) => {
                warn!(content_id, error = %e, "rating update failed");
                MutationResult::failed(&e)
            }
        }
    }

    /// Remove the user's rating; no rating to remove counts as success
    pub async fn delete_user_rating(&self, content_type: RatedContent, content_id: &str) -> MutationResult {
        let result = match self.account_id().await {
            Ok(account) => match rating_path(&account, content_type, content_id) {
                Ok(path) => {
                    self.request::<Value>(Method::DELETE, &path, RequestOptions::new())
                        .await
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => MutationResult::ok(),
            Err(e) if e.is_not_found() => MutationResult::ok(),
            Err(e) => {
                warn!(content_id, error = %e, "rating delete failed");
                MutationResult::failed(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_parse() {
        assert_eq!("Series".parse::<RatedContent>().unwrap(), RatedContent::Series);
        assert_eq!("movie".parse::<RatedContent>().unwrap(), RatedContent::MovieListing);
        assert!("music".parse::<RatedContent>().is_err());
    }

    #[test]
    fn test_rating_path() {
        assert_eq!(
            rating_path("acc", RatedContent::Episode, "E1").unwrap(),
            "/content-reviews/v3/user/acc/rating/episode/E1"
        );
        assert!(rating_path("acc", RatedContent::Series, "").is_err());
    }
}
