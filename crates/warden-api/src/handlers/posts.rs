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

//! Post handlers

use super::{authenticate, json_response, read_json};
use crate::error::{ApiError, ApiResult};
use crate::models::{CreatePostRequest, PostResponse, UpdatePostRequest};
use crate::state::AppState;
use crate::validation::validate_title;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};
use std::error::Error as StdError;
use tracing::info;
use warden_core::Target;
use warden_core::models::{Access, NewPost, PostPatch};

/// Get post handler
/// GET /post/{id}
#[utoipa::path(
    get,
    path = "/post/{id}",
    params(("id" = i64, Path, description = "Post id")),
    responses(
        (status = 200, description = "Post found", body = PostResponse),
        (status = 404, description = "Post not found")
    ),
    tag = "Posts"
)]
pub async fn get_post(id: i64, state: &AppState) -> ApiResult<Response<Full<Bytes>>> {
    let post = state.posts.get_by_id(id).await?.ok_or_else(|| ApiError::NotFound {
        message: format!("Post {} not found", id),
    })?;

    json_response(StatusCode::OK, &PostResponse::from(post))
}

/// Create post handler
/// POST /post
#[utoipa::path(
    post,
    path = "/post",
    request_body = CreatePostRequest,
    responses(
        (status = 200, description = "Post created and owned by the caller", body = PostResponse),
        (status = 400, description = "Invalid title or text"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Write privilege on posts required")
    ),
    security(("token" = [])),
    tag = "Posts"
)]
pub async fn create_post<B>(req: Request<B>, state: &AppState) -> ApiResult<Response<Full<Bytes>>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let identity = authenticate(req.headers(), state).await?;
    let create_request: CreatePostRequest = read_json(req, state.max_body_size).await?;

    validate_title(&create_request.title)?;

    let new_post = NewPost {
        owner_id: Some(identity.user.id),
        title: create_request.title,
        text: create_request.text,
    };
    // Judged against the post as it will be stored, so `self` scoped rights apply
    state.evaluator.ensure(&identity, Target::of(&new_post), Access::Write)?;

    let post = state.posts.insert(new_post).await?;

    info!("User {} created post {}", identity.user.id, post.id);

    json_response(StatusCode::OK, &PostResponse::from(post))
}

/// Update post handler
/// PATCH /post/{id}
#[utoipa::path(
    patch,
    path = "/post/{id}",
    params(("id" = i64, Path, description = "Post id")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Post updated", body = PostResponse),
        (status = 400, description = "Empty or invalid update"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Write privilege on this post required"),
        (status = 404, description = "Post not found")
    ),
    security(("token" = [])),
    tag = "Posts"
)]
pub async fn update_post<B>(req: Request<B>, id: i64, state: &AppState) -> ApiResult<Response<Full<Bytes>>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let identity = authenticate(req.headers(), state).await?;
    let update_request: UpdatePostRequest = read_json(req, state.max_body_size).await?;

    if update_request.title.is_none() && update_request.text.is_none() {
        return Err(ApiError::BadRequest {
            message: "update must change the title or the text".to_string(),
        });
    }
    if let Some(title) = &update_request.title {
        validate_title(title)?;
    }

    let post = state.posts.get_by_id(id).await?.ok_or_else(|| ApiError::NotFound {
        message: format!("Post {} not found", id),
    })?;

    state.evaluator.ensure(&identity, Target::of(&post), Access::Write)?;

    let patch = PostPatch {
        title: update_request.title,
        text: update_request.text,
    };
    let post = state.posts.patch(post, patch).await?;

    info!("User {} updated post {}", identity.user.id, post.id);

    json_response(StatusCode::OK, &PostResponse::from(post))
}
