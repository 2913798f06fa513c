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

//! Configuration management for the resource server

use crate::error::{ApiError, ApiResult};
use crate::validation::{validate_email, validate_password};
use std::env;
use std::time::Duration;
use warden_core::TokenSettings;
use warden_core::seed::AdminAccount;

/// Configuration for the resource server
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// SQLite connection URL
    pub database_url: String,

    /// Upper bound on pooled store connections
    pub max_connections: u32,

    /// How long a request waits for a store connection before failing with 503
    pub acquire_timeout_secs: u64,

    /// Token lifetime in seconds
    pub token_ttl_secs: i64,

    /// Random bytes per issued token
    pub token_length: usize,

    /// Reject expired tokens
    pub enforce_token_expiry: bool,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Account created in the admin group when the default groups are installed
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            database_url: "sqlite://warden.db".to_string(),
            max_connections: 16,
            acquire_timeout_secs: 5,
            token_ttl_secs: 24 * 60 * 60,
            token_length: 32,
            enforce_token_expiry: true,
            max_body_size: 1024 * 1024, // 1MB
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind_address: env::var("WARDEN_BIND_ADDRESS").unwrap_or(defaults.bind_address),

            database_url: env::var("WARDEN_DATABASE_URL").unwrap_or(defaults.database_url),

            max_connections: env::var("WARDEN_MAX_CONNECTIONS").map(|v| v.parse().unwrap_or(defaults.max_connections)).unwrap_or(defaults.max_connections),

            acquire_timeout_secs: env::var("WARDEN_ACQUIRE_TIMEOUT_SECS")
                .map(|v| v.parse().unwrap_or(defaults.acquire_timeout_secs))
                .unwrap_or(defaults.acquire_timeout_secs),

            token_ttl_secs: env::var("WARDEN_TOKEN_TTL_SECS").map(|v| v.parse().unwrap_or(defaults.token_ttl_secs)).unwrap_or(defaults.token_ttl_secs),

            token_length: env::var("WARDEN_TOKEN_LENGTH").map(|v| v.parse().unwrap_or(defaults.token_length)).unwrap_or(defaults.token_length),

            enforce_token_expiry: env::var("WARDEN_ENFORCE_TOKEN_EXPIRY").map(|v| v.parse().unwrap_or(true)).unwrap_or(true),

            max_body_size: env::var("WARDEN_MAX_BODY_SIZE").map(|v| v.parse().unwrap_or(defaults.max_body_size)).unwrap_or(defaults.max_body_size),

            bootstrap_admin_email: env::var("WARDEN_BOOTSTRAP_ADMIN_EMAIL").ok(),

            bootstrap_admin_password: env::var("WARDEN_BOOTSTRAP_ADMIN_PASSWORD").ok(),
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            ttl: chrono::Duration::seconds(self.token_ttl_secs),
            length: self.token_length,
            enforce_expiry: self.enforce_token_expiry,
        }
    }

    /// Bootstrap admin credentials, present only when both variables are set.
    ///
    /// The account is held to the same email and password rules as one created over HTTP.
    pub fn bootstrap_admin(&self) -> ApiResult<Option<AdminAccount>> {
        let (Some(email), Some(password)) = (&self.bootstrap_admin_email, &self.bootstrap_admin_password) else {
            return Ok(None);
        };

        validate_email(email)
            .and_then(|_| validate_password(password))
            .map_err(|e| ApiError::Config {
                message: format!("bootstrap admin: {}", e),
            })?;

        Ok(Some(AdminAccount {
            email: email.clone(),
            password: password.clone(),
        }))
    }
}
