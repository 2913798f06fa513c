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

//! HTTP request handlers

pub mod auth;
pub mod health;
pub mod posts;
pub mod rights;
pub mod users;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::AUTHORIZATION;
use hyper::{HeaderMap, Request, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::error::Error as StdError;
use warden_core::Identity;

/// Header carrying the bearer token
pub const TOKEN_HEADER: &str = "token";

/// Read at most `limit` bytes of the request body and decode them as JSON.
pub(crate) async fn read_json<T, B>(req: Request<B>, limit: usize) -> ApiResult<T>
where
    T: DeserializeOwned,
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let body = Limited::new(req.into_body(), limit)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::PayloadTooLarge {
                    message: format!("request body exceeds {} bytes", limit),
                }
            } else {
                ApiError::BadRequest {
                    message: format!("failed to read request body: {}", e),
                }
            }
        })?
        .to_bytes();

    Ok(serde_json::from_slice(&body)?)
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, value: &T) -> ApiResult<Response<Full<Bytes>>> {
    let response_json = serde_json::to_string(value)?;

    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(response_json)))?)
}

/// Token from the `token` header, falling back to `Authorization: Bearer`.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers.get(TOKEN_HEADER).and_then(|value| value.to_str().ok()) {
        return Some(token.trim());
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Resolve the caller behind the request's token.
pub(crate) async fn authenticate(headers: &HeaderMap, state: &AppState) -> ApiResult<Identity> {
    let token = extract_token(headers).filter(|token| !token.is_empty()).ok_or_else(|| ApiError::Unauthorized {
        message: "missing access token".to_string(),
    })?;

    Ok(state.authenticator.resolve(token).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn token_header_wins_over_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-authorization"));
        assert_eq!(extract_token(&headers), Some("from-authorization"));

        headers.insert(TOKEN_HEADER, HeaderValue::from_static("from-token-header"));
        assert_eq!(extract_token(&headers), Some("from-token-header"));
    }

    #[test]
    fn other_authorization_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_token(&headers), None);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let req = Request::new(Full::new(Bytes::from(r#"{"title":"a long enough title"}"#)));
        let result: ApiResult<serde_json::Value> = read_json(req, 8).await;
        assert!(matches!(result, Err(ApiError::PayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let req = Request::new(Full::new(Bytes::from("{not json")));
        let err = read_json::<serde_json::Value, _>(req, 1024).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
