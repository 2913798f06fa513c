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

//! Request and response bodies of the HTTP API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use warden_core::models::{Access, AccessToken, Post, ResourceType, Right, Scope, User};

// Authentication models

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "admin@example.com")]
    pub email: String,
    pub password: String,
}

/// Issued bearer token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// Value to send in the `token` header
    pub token: String,
    pub user_id: i64,
    pub creation_time: DateTime<Utc>,
    /// Seconds until the token expires
    pub expires_in: i64,
}

impl TokenResponse {
    pub fn new(token: AccessToken, ttl: chrono::Duration) -> Self {
        Self {
            token: token.token,
            user_id: token.user_id,
            creation_time: token.creation_time,
            expires_in: ttl.num_seconds(),
        }
    }
}

// User models

/// User creation request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "someone@example.com")]
    pub email: String,
    /// At least 8 letters and digits, mixing lowercase, uppercase and digits
    pub password: String,
    #[serde(default)]
    pub group_id: Option<i64>,
}

/// User as returned to clients; the password hash never leaves the server
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub group_id: Option<i64>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            group_id: user.group_id,
        }
    }
}

// Right models

/// Right creation request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateRightRequest {
    #[schema(value_type = String, example = "post")]
    pub object: ResourceType,
    #[schema(value_type = String, example = "read")]
    pub access: Access,
    #[schema(value_type = String, example = "all")]
    pub scope: Scope,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RightResponse {
    pub id: i64,
    #[schema(value_type = String, example = "post")]
    pub object: ResourceType,
    #[schema(value_type = String, example = "read")]
    pub access: Access,
    #[schema(value_type = String, example = "all")]
    pub scope: Scope,
}

impl From<Right> for RightResponse {
    fn from(right: Right) -> Self {
        Self {
            id: right.id,
            object: right.object,
            access: right.access,
            scope: right.scope,
        }
    }
}

// Post models

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    pub title: String,
    pub text: String,
}

/// Partial post update; at least one field must be present
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostResponse {
    pub id: i64,
    pub owner_id: Option<i64>,
    pub title: String,
    pub text: String,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            owner_id: post.owner_id,
            title: post.title,
            text: post.text,
        }
    }
}

// Health models

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "OK")]
    pub status: String,
    pub timestamp: DateTime<Utc>,
}
