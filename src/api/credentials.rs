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


//! Credential channel to the host page
//!
//! The content script inside the streaming site intercepts the site's own
//! bearer token and answers credential requests. The exchange is a pair of
//! messages correlated by id:
//!
//! ```json
//! {"type": "REQUEST_CREDENTIALS", "id": "…"}
//! {"type": "CREDENTIALS_RESPONSE", "id": "…", "credentials": {"tokenData": {…}, "profileData": {…}}}
//! ```
//!
//! The host may not have seen a token yet, may answer with no credentials,
//! or may not answer at all. None of that is a network failure: it means
//! "not available yet". [`MessageCredentialSource`] waits up to a timeout
//! per attempt and retries with a linear backoff (`backoff * attempt`).
//!
//! [`credential_channel`] creates both ends: the client keeps the
//! [`CredentialChannel`], the host-page bridge drives the [`HostPort`].

use crate::api::auth::{select_profile, ProfileData, TokenData};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Payload delivered by the host page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub token_data: TokenData,

    #[serde(default)]
    pub profile_data: Option<ProfilePayload>,
}

/// The host sends either the active profile or the whole profile list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfilePayload {
    Single(ProfileData),
    Many(Vec<ProfileData>),
}

impl ProfilePayload {
    pub fn into_selected(self) -> Option<ProfileData> {
        match self {
            ProfilePayload::Single(profile) => Some(profile),
            ProfilePayload::Many(profiles) => select_profile(profiles),
        }
    }
}

/// Messages crossing the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelMessage {
    RequestCredentials {
        id: Uuid,
    },
    CredentialsResponse {
        id: Uuid,
        #[serde(default)]
        credentials: Option<Credentials>,
    },
}

/// Where the auth manager gets fresh credentials from
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// `None` means "not available yet", after all attempts are spent
    async fn request_credentials(&self, retries: u32) -> Option<Credentials>;
}

/// Create a connected client/host pair
pub fn credential_channel(buffer: usize) -> (CredentialChannel, HostPort) {
    let (request_tx, request_rx) = mpsc::channel(buffer.max(1));
    let (response_tx, response_rx) = mpsc::channel(buffer.max(1));

    (
        CredentialChannel {
            requests: request_tx,
            responses: Mutex::new(response_rx),
        },
        HostPort {
            requests: request_rx,
            responses: response_tx,
        },
    )
}

/// Client end of the channel
#[derive(Debug)]
pub struct CredentialChannel {
    requests: mpsc::Sender<ChannelMessage>,
    responses: Mutex<mpsc::Receiver<ChannelMessage>>,
}

impl CredentialChannel {
    /// One request/response exchange
    ///
    /// Responses carrying another id (late answers to earlier attempts) are
    /// discarded.
    ///
    /// # Errors
    /// - `CredentialTimeout` if no matching response arrives in time
    /// - `ChannelClosed` if the host end was dropped
    pub async fn request(&self, wait: Duration, attempt: u32) -> Result<Option<Credentials>> {
        // Held for the whole exchange so responses cannot be stolen by a
        // concurrent request
        let mut responses = self.responses.lock().await;

        let id = Uuid::new_v4();
        self.requests
            .send(ChannelMessage::RequestCredentials { id })
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;

        let deadline = Instant::now() + wait;
        loop {
            match timeout_at(deadline, responses.recv()).await {
                Err(_) => {
                    return Err(BridgeError::CredentialTimeout {
                        attempt,
                        timeout_ms: wait.as_millis() as u64,
                    })
                }
                Ok(None) => return Err(BridgeError::ChannelClosed),
                Ok(Some(ChannelMessage::CredentialsResponse { id: rid, credentials })) if rid == id => {
                    return Ok(credentials)
                }
                Ok(Some(other)) => debug!(message = ?message_id(&other), "discarding uncorrelated message"),
            }
        }
    }
}

fn message_id(message: &ChannelMessage) -> Uuid {
    match message {
        ChannelMessage::RequestCredentials { id } | ChannelMessage::CredentialsResponse { id, .. } => *id,
    }
}

/// Host-page end of the channel
#[derive(Debug)]
pub struct HostPort {
    requests: mpsc::Receiver<ChannelMessage>,
    responses: mpsc::Sender<ChannelMessage>,
}

impl HostPort {
    /// Next request id, `None` once the client end is gone
    pub async fn next_request(&mut self) -> Option<Uuid> {
        loop {
            match self.requests.recv().await? {
                ChannelMessage::RequestCredentials { id } => return Some(id),
                other => debug!(message = ?message_id(&other), "host ignoring non-request message"),
            }
        }
    }

    pub async fn respond(&self, id: Uuid, credentials: Option<Credentials>) -> Result<()> {
        self.responses
            .send(ChannelMessage::CredentialsResponse { id, credentials })
            .await
            .map_err(|_| BridgeError::ChannelClosed)
    }

    /// Answer every request with whatever `provide` returns, until the
    /// client end is dropped
    pub fn serve<F>(mut self, provide: F) -> JoinHandle<()>
    where
        F: Fn() -> Option<Credentials> + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            while let Some(id) = self.next_request().await {
                if self.respond(id, provide()).await.is_err() {
                    break;
                }
            }
        })
    }
}

/// [`CredentialSource`] backed by the host-page channel
#[derive(Debug)]
pub struct MessageCredentialSource {
    channel: CredentialChannel,
    timeout: Duration,
    backoff: Duration,
}

impl MessageCredentialSource {
    pub fn new(channel: CredentialChannel, timeout: Duration, backoff: Duration) -> Self {
        Self {
            channel,
            timeout,
            backoff,
        }
    }
}

#[async_trait]
impl CredentialSource for MessageCredentialSource {
    async fn request_credentials(&self, retries: u32) -> Option<Credentials> {
        let attempts = retries + 1;

        for attempt in 1..=attempts {
            match self.channel.request(self.timeout, attempt).await {
                Ok(Some(credentials)) => {
                    debug!(attempt, "credentials received from host page");
                    return Some(credentials);
                }
                Ok(None) => debug!(attempt, "host page has no credentials yet"),
                Err(BridgeError::ChannelClosed) => {
                    warn!("credential channel closed");
                    return None;
                }
                Err(e) => debug!(attempt, error = %e, "credential request unanswered"),
            }

            if attempt < attempts {
                sleep(self.backoff * attempt).await;
            }
        }

        None
    }
}
