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


//! Error types for WatchBridge
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are grouped by where they originate (credentials, HTTP, storage, ...).
//!
//! ## Error categories
//!
//! - **Auth**: no usable token/profile after bootstrap (`Auth`)
//! - **HTTP**: any non-2xx response (`Http`), rate limiting (`RateLimitExceeded`)
//! - **Credential channel**: the host page never answered (`CredentialTimeout`),
//!   or the channel was dropped (`ChannelClosed`)
//! - **Response**: body could not be parsed into the expected shape
//! - **Storage**: key/value persistence failures
//!
//! Fan-out operations never surface a leg failure as an error value; the leg
//! is logged and replaced with a default.

use thiserror::Error;

/// Result type alias using our BridgeError type
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for WatchBridge
#[derive(Error, Debug)]
pub enum BridgeError {
    // ===== Auth Errors =====

    /// No valid token or profile id could be obtained
    #[error("Authentication failed: {message}")]
    Auth {
        message: String,
        /// Account ID if one was resolved
        account_id: Option<String>,
    },

    // ===== HTTP Errors =====

    /// Service answered with a non-2xx status
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        /// Endpoint path that failed
        endpoint: Option<String>,
    },

    /// API rate limiting (HTTP 429)
    #[error("API rate limit exceeded. Retry after {retry_after_seconds} seconds")]
    RateLimitExceeded {
        /// Seconds to wait before retrying
        retry_after_seconds: u64,
        /// Endpoint that was rate limited
        endpoint: String,
    },

    /// API returned invalid or unexpected response format
    #[error("Invalid API response: {message}")]
    InvalidApiResponse {
        message: String,
        /// Response body snippet for debugging
        response_body: Option<String>,
    },

    /// Network connectivity error
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        /// Whether this error might be transient
        is_transient: bool,
    },

    // ===== Credential Channel Errors =====

    /// The host page did not answer a credential request in time
    #[error("Credential request timed out after {timeout_ms} ms (attempt {attempt})")]
    CredentialTimeout {
        attempt: u32,
        timeout_ms: u64,
    },

    /// The credential channel has no peer anymore
    #[error("Credential channel closed")]
    ChannelClosed,

    // ===== Storage Errors =====

    /// Key/value store failure
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Database schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    // ===== General Errors =====

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// URL could not be built
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

// Helper methods for creating common errors
impl BridgeError {
    /// Create an Auth error
    pub fn auth_failed<S: Into<String>>(message: S, account_id: Option<String>) -> Self {
        BridgeError::Auth {
            message: message.into(),
            account_id,
        }
    }

    /// Create an Http error
    pub fn http<S: Into<String>>(status: u16, message: S, endpoint: Option<String>) -> Self {
        BridgeError::Http {
            status,
            message: message.into(),
            endpoint,
        }
    }

    /// Create a NetworkError
    pub fn network_error<S: Into<String>>(message: S, is_transient: bool) -> Self {
        BridgeError::NetworkError {
            message: message.into(),
            is_transient,
        }
    }

    /// Create an InvalidApiResponse error
    pub fn invalid_response<S: Into<String>>(message: S, response_body: Option<String>) -> Self {
        BridgeError::InvalidApiResponse {
            message: message.into(),
            response_body,
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            BridgeError::Http { status, .. } => Some(*status),
            BridgeError::RateLimitExceeded { .. } => Some(429),
            BridgeError::ReqwestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True for HTTP 404
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// True for HTTP 409
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// Check if error is retryable (network errors, timeouts, 5xx)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::NetworkError { is_transient: true, .. }
                | BridgeError::CredentialTimeout { .. }
                | BridgeError::Http { status: 500..=599, .. }
                | BridgeError::RateLimitExceeded { .. }
        )
    }

    /// Check if error is due to authentication/authorization
    ///
    /// 401/403 responses count: the client has already dropped its token
    /// when one of these is returned.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            BridgeError::Auth { .. } | BridgeError::Http { status: 401 | 403, .. }
        )
    }

    /// Get retry delay in seconds for rate-limited requests
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            BridgeError::RateLimitExceeded { retry_after_seconds, .. } => {
                Some(*retry_after_seconds)
            }
            _ => None,
        }
    }

    /// Get user-friendly error message suitable for display
    ///
    /// This is the string placed in `MutationResult::error`.
    pub fn user_message(&self) -> String {
        match self {
            BridgeError::Auth { .. } => {
                "Not signed in. Open the streaming site in a tab and try again.".to_string()
            }
            BridgeError::Http { status: 401 | 403, .. } => {
                "Your session has expired. Please reload the streaming site.".to_string()
            }
            BridgeError::Http { status: 404, .. } => "Content not found.".to_string(),
            BridgeError::RateLimitExceeded { retry_after_seconds, .. } => {
                format!(
                    "Too many requests. Please wait {} seconds before trying again.",
                    retry_after_seconds
                )
            }
            BridgeError::CredentialTimeout { .. } | BridgeError::ChannelClosed => {
                "Could not read credentials from the streaming site.".to_string()
            }
            BridgeError::NetworkError { .. } | BridgeError::ReqwestError(_) => {
                "Network error. Check your connection and try again.".to_string()
            }
            _ => self.to_string(),
        }
    }
}
