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

//! Client core of the WatchBridge browser extension
//!
//! Talks to the streaming service's web API with credentials captured from
//! the host page, caches responses, and exposes the higher-level operations
//! the extension UI needs. See [`api::StreamClient`].

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod storage;

pub use api::StreamClient;
pub use config::ClientConfig;
pub use error::{BridgeError, Result};
