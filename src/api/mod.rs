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


//! Streaming service API client
//!
//! Leaf-first:
//! - [`credentials`]: request/response channel to the host page
//! - [`auth`]: token/profile state, expiry and single-flight bootstrap
//! - [`cache`]: TTL cache keyed by method and full URL
//! - [`transport`]: HTTP seam and its reqwest implementation
//! - [`client`]: [`StreamClient`] and the request builder
//! - [`browse`], [`history`], [`series`], [`watchlist`], [`rating`],
//!   [`playback`], [`profile`]: the public operations

pub mod auth;
pub mod browse;
pub mod cache;
pub mod client;
pub mod credentials;
pub mod history;
pub mod models;
pub mod playback;
pub mod profile;
pub mod rating;
pub mod series;
pub mod transport;
pub mod watchlist;

// Re-export commonly used types
pub use auth::{AuthManager, ProfileData, TokenData};
pub use browse::{BrowseOptions, HomeData, HomeOptions, SearchOptions};
pub use client::{RequestOptions, StreamClient, StreamClientBuilder};
pub use credentials::{credential_channel, CredentialSource, Credentials, MessageCredentialSource};
pub use history::{ContinueWatchingItem, Playhead};
pub use models::{ListResponse, MutationResult};
pub use playback::PlaybackStream;
pub use rating::RatedContent;
pub use series::SeriesWithSeasons;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use watchlist::WatchlistOptions;
