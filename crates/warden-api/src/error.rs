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

//! Error handling for the resource server
//! Implements RFC 7807 Problem Details format

use http_body_util::Full;
use hyper::{Response, StatusCode, body::Bytes};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};
use warden_core::{AccessError, AuthError, StoreError};

/// API error types following REST conventions
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Method not allowed: {message}")]
    MethodNotAllowed { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Payload too large: {message}")]
    PayloadTooLarge { message: String },

    #[error("Internal server error: {message}")]
    InternalServerError { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// Startup settings that cannot be used as given
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Invalid JSON: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Router error: {0}")]
    RouterError(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            // Malformed bodies and schema mismatches are the client's fault
            ApiError::SerdeJsonError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "bad_request",
            ApiError::Unauthorized { .. } => "unauthorized",
            ApiError::Forbidden { .. } => "forbidden",
            ApiError::NotFound { .. } => "not_found",
            ApiError::MethodNotAllowed { .. } => "method_not_allowed",
            ApiError::Conflict { .. } => "conflict",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::InternalServerError { .. } => "internal_server_error",
            ApiError::ServiceUnavailable { .. } => "service_unavailable",
            ApiError::Config { .. } => "config_error",
            ApiError::SerdeJsonError(_) => "json_error",
            ApiError::IoError(_) => "io_error",
            ApiError::HttpError(_) => "http_error",
            ApiError::RouterError(_) => "router_error",
        }
    }

    /// Whether the same request may succeed when sent again unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::ServiceUnavailable { .. })
    }

    /// Convert into a problem details response for the request at `instance`
    pub fn into_response(self, instance: &str) -> Response<Full<Bytes>> {
        let status_code = self.status_code();
        let mut problem_details = ProblemDetails::new(&self, instance.to_string());
        if self.is_retryable() {
            problem_details = problem_details.with_extension("retryable".to_string(), serde_json::Value::Bool(true));
        }

        if status_code.is_server_error() {
            error!("API Error: {} - {}", status_code, self);
        } else {
            warn!("API Error: {} - {}", status_code, self);
        }

        let json = match serde_json::to_string(&problem_details) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize error response: {}", e);
                r#"{"type":"https://warden.synerthink.com/problems/internal_server_error","title":"Internal Server Error","status":500,"detail":"An internal error occurred","instance":"/"}"#.to_string()
            }
        };

        Response::builder()
            .status(status_code)
            .header("content-type", "application/problem+json")
            .header("cache-control", "no-cache")
            .body(Full::new(Bytes::from(json.clone())))
            .unwrap_or_else(|e| {
                error!("Failed to build error response: {}", e);
                let mut fallback = Response::new(Full::new(Bytes::from(json)));
                *fallback.status_mut() = status_code;
                fallback
            })
    }
}

/// RFC 7807 Problem Details response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// A URI reference that identifies the problem type
    #[serde(rename = "type")]
    pub problem_type: String,

    /// A short, human-readable summary of the problem type
    pub title: String,

    /// The HTTP status code generated by the origin server
    pub status: u16,

    /// A human-readable explanation specific to this occurrence
    pub detail: String,

    /// A URI reference that identifies the specific occurrence
    pub instance: String,

    /// Additional extension members
    #[serde(flatten)]
    pub extensions: HashMap<String, serde_json::Value>,
}

impl ProblemDetails {
    pub fn new(error: &ApiError, instance: String) -> Self {
        let status_code = error.status_code();

        Self {
            problem_type: format!("https://warden.synerthink.com/problems/{}", error.error_type()),
            title: status_code.canonical_reason().unwrap_or("Unknown Error").to_string(),
            status: status_code.as_u16(),
            detail: error.to_string(),
            instance,
            extensions: HashMap::new(),
        }
    }

    pub fn with_extension(mut self, key: String, value: serde_json::Value) -> Self {
        self.extensions.insert(key, value);
        self
    }
}

/// Convert ApiError to HTTP response
impl From<ApiError> for Response<Full<Bytes>> {
    fn from(error: ApiError) -> Self {
        error.into_response("/")
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

impl From<hyper::http::Error> for ApiError {
    fn from(err: hyper::http::Error) -> Self {
        ApiError::HttpError(err.to_string())
    }
}

impl From<matchit::InsertError> for ApiError {
    fn from(err: matchit::InsertError) -> Self {
        ApiError::RouterError(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists { .. } => ApiError::Conflict { message: err.to_string() },
            StoreError::MissingReference { .. } => ApiError::BadRequest { message: err.to_string() },
            StoreError::NotFound { .. } => ApiError::NotFound { message: err.to_string() },
            StoreError::Unavailable(_) => ApiError::ServiceUnavailable { message: err.to_string() },
            StoreError::Database(_) | StoreError::Migrate(_) => ApiError::InternalServerError { message: err.to_string() },
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UnknownEmail => ApiError::NotFound { message: err.to_string() },
            AuthError::WrongPassword | AuthError::TokenNotFound | AuthError::TokenExpired | AuthError::IdentityGone { .. } => {
                ApiError::Unauthorized { message: err.to_string() }
            }
            AuthError::Hashing(_) | AuthError::Randomness => ApiError::InternalServerError { message: err.to_string() },
            AuthError::Store(store_err) => store_err.into(),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        ApiError::Forbidden { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use warden_core::models::{Access, ResourceType};

    #[test]
    fn core_errors_map_to_statuses() {
        let conflict: ApiError = StoreError::AlreadyExists { constraint: "users.email".to_string() }.into();
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let missing: ApiError = StoreError::NotFound { table: "posts", id: 1 }.into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let bad_reference: ApiError = StoreError::MissingReference { message: "group".to_string() }.into();
        assert_eq!(bad_reference.status_code(), StatusCode::BAD_REQUEST);
        assert!(!bad_reference.is_retryable());

        assert_eq!(ApiError::from(AuthError::UnknownEmail).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(AuthError::WrongPassword).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthError::TokenExpired).status_code(), StatusCode::UNAUTHORIZED);

        let forbidden: ApiError = AccessError::Forbidden {
            resource: ResourceType::Post,
            access: Access::Write,
        }
        .into();
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

        let config = ApiError::Config { message: "bind address".to_string() };
        assert_eq!(config.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(config.error_type(), "config_error");
    }

    #[tokio::test]
    async fn problem_details_body() {
        let response = ApiError::Conflict { message: "taken".to_string() }.into_response("/user");
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response.headers()["content-type"], "application/problem+json");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let details: ProblemDetails = serde_json::from_slice(&body).unwrap();
        assert_eq!(details.status, 409);
        assert_eq!(details.instance, "/user");
        assert_eq!(details.problem_type, "https://warden.synerthink.com/problems/conflict");
    }
}
