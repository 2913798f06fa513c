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

//! User handlers

use super::{authenticate, json_response, read_json};
use crate::error::ApiResult;
use crate::models::{CreateUserRequest, UserResponse};
use crate::state::AppState;
use crate::validation::{validate_email, validate_password};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};
use std::error::Error as StdError;
use tracing::info;
use warden_core::Target;
use warden_core::models::{Access, NewUser, User};

/// Create user handler
/// POST /user
#[utoipa::path(
    post,
    path = "/user",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid email, weak password or unknown group"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Write privilege on users required"),
        (status = 409, description = "Email already registered")
    ),
    security(("token" = [])),
    tag = "Users"
)]
pub async fn create_user<B>(req: Request<B>, state: &AppState) -> ApiResult<Response<Full<Bytes>>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let identity = authenticate(req.headers(), state).await?;
    let create_request: CreateUserRequest = read_json(req, state.max_body_size).await?;

    validate_email(&create_request.email)?;
    validate_password(&create_request.password)?;

    state.evaluator.ensure(&identity, Target::type_of::<User>(), Access::Write)?;

    let new_user = NewUser::with_password(create_request.email, &create_request.password, create_request.group_id).await?;
    let user = state.users.insert(new_user).await?;

    info!("User {} created user {}", identity.user.id, user.id);

    json_response(StatusCode::OK, &UserResponse::from(user))
}
