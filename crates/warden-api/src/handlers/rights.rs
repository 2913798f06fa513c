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

//! Right handlers

use super::{authenticate, json_response, read_json};
use crate::error::{ApiError, ApiResult};
use crate::models::{CreateRightRequest, RightResponse};
use crate::state::AppState;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};
use std::error::Error as StdError;
use tracing::info;
use warden_core::Target;
use warden_core::models::{Access, NewRight, Right};

/// Get right handler
/// GET /right/{id}
#[utoipa::path(
    get,
    path = "/right/{id}",
    params(("id" = i64, Path, description = "Right id")),
    responses(
        (status = 200, description = "Right found", body = RightResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Read privilege on rights required"),
        (status = 404, description = "Right not found")
    ),
    security(("token" = [])),
    tag = "Rights"
)]
pub async fn get_right<B>(req: Request<B>, id: i64, state: &AppState) -> ApiResult<Response<Full<Bytes>>> {
    let identity = authenticate(req.headers(), state).await?;

    let right = state.rights.get_by_id(id).await?.ok_or_else(|| ApiError::NotFound {
        message: format!("Right {} not found", id),
    })?;

    state.evaluator.ensure(&identity, Target::of(&right), Access::Read)?;

    json_response(StatusCode::OK, &RightResponse::from(right))
}

/// Create right handler
/// POST /right
#[utoipa::path(
    post,
    path = "/right",
    request_body = CreateRightRequest,
    responses(
        (status = 200, description = "Right created", body = RightResponse),
        (status = 400, description = "Unknown object, access or scope"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Write privilege on rights required"),
        (status = 409, description = "Right already exists")
    ),
    security(("token" = [])),
    tag = "Rights"
)]
pub async fn create_right<B>(req: Request<B>, state: &AppState) -> ApiResult<Response<Full<Bytes>>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let identity = authenticate(req.headers(), state).await?;
    let create_request: CreateRightRequest = read_json(req, state.max_body_size).await?;

    state.evaluator.ensure(&identity, Target::type_of::<Right>(), Access::Write)?;

    let right = state.rights.insert(NewRight::new(create_request.object, create_request.access, create_request.scope)).await?;

    info!("User {} created right {} ({} {} {})", identity.user.id, right.id, right.object, right.access, right.scope);

    json_response(StatusCode::OK, &RightResponse::from(right))
}
