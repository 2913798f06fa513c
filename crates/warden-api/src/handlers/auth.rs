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

//! Authentication handlers

use super::{json_response, read_json};
use crate::error::ApiResult;
use crate::models::{LoginRequest, TokenResponse};
use crate::state::AppState;
use crate::validation::validate_email;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};
use std::error::Error as StdError;
use tracing::info;

/// Login handler
/// POST /login
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Wrong password"),
        (status = 404, description = "No account for this email"),
        (status = 400, description = "Malformed body or email")
    ),
    tag = "Authentication"
)]
pub async fn login<B>(req: Request<B>, state: &AppState) -> ApiResult<Response<Full<Bytes>>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    info!("Processing login request");

    let login_request: LoginRequest = read_json(req, state.max_body_size).await?;
    validate_email(&login_request.email)?;
    let token = state.authenticator.login(&login_request.email, &login_request.password).await?;

    json_response(StatusCode::OK, &TokenResponse::new(token, state.authenticator.settings().ttl))
}
