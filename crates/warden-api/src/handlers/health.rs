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

//! Health check handler

use super::json_response;
use crate::error::ApiResult;
use crate::models::HealthResponse;
use crate::state::AppState;
use chrono::Utc;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use tracing::debug;

/// Health check handler
/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Store is unreachable")
    ),
    tag = "Health"
)]
pub async fn health_check(state: &AppState) -> ApiResult<Response<Full<Bytes>>> {
    debug!("Processing health check request");

    state.store.ping().await?;

    json_response(
        StatusCode::OK,
        &HealthResponse {
            status: "OK".to_string(),
            timestamp: Utc::now(),
        },
    )
}
