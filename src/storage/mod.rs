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


//! Persistence
//!
//! Credentials survive in two scopes: a session scope (gone with the
//! process) and an extension scope (durable, SQLite via sqlx). Reads prefer
//! the session scope.
//!
//! # Usage Example
//! ```no_run
//! use std::sync::Arc;
//! use watchbridge_core::storage::{CredentialStore, Database, MemoryStore, SqliteStore};
//!
//! # async fn example() -> watchbridge_core::error::Result<()> {
//! let db = Database::new("./watchbridge.db").await?;
//! let store = CredentialStore::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(SqliteStore::new(db, "extension")),
//! );
//! let persisted = store.load().await?;
//! println!("token present: {}", persisted.token.is_some());
//! # Ok(())
//! # }
//! ```

pub mod credentials;
pub mod database;
pub mod kv;
pub mod migrations;

// Re-export commonly used types
pub use credentials::{CredentialStore, PersistedCredentials};
pub use database::Database;
pub use kv::{KeyValueStore, MemoryStore, SqliteStore};
