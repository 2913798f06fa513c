// Warden
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Error types raised below the HTTP boundary
//!
//! Each layer has its own enum. Nothing in this crate swallows an error: the store,
//! authenticator and access evaluator return typed failures and the boundary layer maps
//! every variant to a status code.

use crate::models::{Access, ResourceType};
use thiserror::Error;

/// Failures of the persistence layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("already exists: {constraint}")]
    AlreadyExists { constraint: String },

    /// A foreign key points at a row that does not exist
    #[error("referenced row does not exist: {message}")]
    MissingReference { message: String },

    /// The row addressed by a patch vanished before the write
    #[error("{table} row {id} not found")]
    NotFound { table: &'static str, id: i64 },

    /// The store could not be reached in time; the operation may be retried
    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Whether the failure is transient and the whole request may be attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => StoreError::AlreadyExists {
                constraint: db_err.message().to_string(),
            },
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => StoreError::MissingReference {
                message: db_err.message().to_string(),
            },
            sqlx::Error::Database(ref db_err) if is_lock_contention(db_err.code().as_deref()) => StoreError::Unavailable(err),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err),
            other => StoreError::Database(other),
        }
    }
}

/// SQLite result codes raised when another connection holds the database lock:
/// BUSY, LOCKED, BUSY_RECOVERY, LOCKED_SHAREDCACHE and BUSY_SNAPSHOT.
const LOCK_CONTENTION_CODES: [&str; 5] = ["5", "6", "261", "262", "517"];

fn is_lock_contention(code: Option<&str>) -> bool {
    code.is_some_and(|code| LOCK_CONTENTION_CODES.contains(&code))
}

/// Failures while logging in or resolving a bearer token
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no account registered for this email")]
    UnknownEmail,

    #[error("wrong password")]
    WrongPassword,

    #[error("access token not found")]
    TokenNotFound,

    #[error("access token has expired")]
    TokenExpired,

    /// The token is valid but its owner no longer exists
    #[error("user {user_id} behind the access token no longer exists")]
    IdentityGone { user_id: i64 },

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("secure random generator failed")]
    Randomness,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a denied authorization check
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("privilege required: {access} on {resource}")]
    Forbidden { resource: ResourceType, access: Access },
}

/// Raised when a stored enum column holds an unknown value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_contention_codes() {
        assert!(is_lock_contention(Some("5")));
        assert!(is_lock_contention(Some("517")));
        assert!(!is_lock_contention(Some("2067")));
        assert!(!is_lock_contention(None));
    }
}
