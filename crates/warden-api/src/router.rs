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

//! HTTP router for the resource server

use crate::error::{ApiError, ApiResult};
use crate::handlers::{TOKEN_HEADER, auth, health, posts, rights, users};
use crate::models::{
    CreatePostRequest, CreateRightRequest, CreateUserRequest, HealthResponse, LoginRequest, PostResponse, RightResponse, TokenResponse, UpdatePostRequest,
    UserResponse,
};
use crate::state::AppState;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response, StatusCode};
use std::error::Error as StdError;
use tracing::info;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Health,
    OpenApi,
    Login,
    Users,
    Rights,
    Right,
    Posts,
    Post,
}

/// HTTP router for the REST API
pub struct Router {
    state: AppState,
    routes: matchit::Router<Endpoint>,
    openapi_spec: String,
}

impl Router {
    pub fn new(state: AppState) -> ApiResult<Self> {
        let mut routes = matchit::Router::new();
        routes.insert("/health", Endpoint::Health)?;
        routes.insert("/openapi.json", Endpoint::OpenApi)?;
        routes.insert("/login", Endpoint::Login)?;
        routes.insert("/user", Endpoint::Users)?;
        routes.insert("/right", Endpoint::Rights)?;
        routes.insert("/right/{id}", Endpoint::Right)?;
        routes.insert("/post", Endpoint::Posts)?;
        routes.insert("/post/{id}", Endpoint::Post)?;

        Ok(Self {
            state,
            routes,
            openapi_spec: generate_openapi_spec(),
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Route a request to the appropriate handler
    pub async fn route<B>(&self, req: Request<B>) -> ApiResult<Response<Full<Bytes>>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let path = req.uri().path().to_string();
        let method = req.method().clone();

        info!("Routing request: {} {}", method, path);

        let (endpoint, id) = {
            let matched = self.routes.at(&path).map_err(|_| ApiError::NotFound {
                message: format!("No route for {}", path),
            })?;
            (*matched.value, matched.params.get("id").map(str::to_string))
        };

        match (endpoint, &method) {
            (Endpoint::Health, &Method::GET) => health::health_check(&self.state).await,
            (Endpoint::OpenApi, &Method::GET) => self.serve_openapi_spec(),
            (Endpoint::Login, &Method::POST) => auth::login(req, &self.state).await,
            (Endpoint::Users, &Method::POST) => users::create_user(req, &self.state).await,
            (Endpoint::Rights, &Method::POST) => rights::create_right(req, &self.state).await,
            (Endpoint::Right, &Method::GET) => rights::get_right(req, parse_id(id)?, &self.state).await,
            // PATCH on the collection is accepted as an alias of POST
            (Endpoint::Posts, &Method::POST) | (Endpoint::Posts, &Method::PATCH) => posts::create_post(req, &self.state).await,
            (Endpoint::Post, &Method::GET) => posts::get_post(parse_id(id)?, &self.state).await,
            (Endpoint::Post, &Method::PATCH) => posts::update_post(req, parse_id(id)?, &self.state).await,
            _ => Err(ApiError::MethodNotAllowed {
                message: format!("Method {} not allowed for {}", method, path),
            }),
        }
    }

    /// Route a request and render any failure as a problem details response
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let path = req.uri().path().to_string();
        match self.route(req).await {
            Ok(response) => response,
            Err(e) => e.into_response(&path),
        }
    }

    fn serve_openapi_spec(&self) -> ApiResult<Response<Full<Bytes>>> {
        Ok(Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(self.openapi_spec.clone())))?)
    }

    /// Get the OpenAPI specification
    pub fn openapi_spec(&self) -> &str {
        &self.openapi_spec
    }
}

/// Ids are numeric; anything else cannot name an existing row.
fn parse_id(id: Option<String>) -> ApiResult<i64> {
    let raw = id.unwrap_or_default();
    raw.parse().map_err(|_| ApiError::NotFound {
        message: format!("No resource with id '{}'", raw),
    })
}

fn generate_openapi_spec() -> String {
    #[derive(OpenApi)]
    #[openapi(
        paths(
            health::health_check,
            auth::login,
            users::create_user,
            rights::get_right,
            rights::create_right,
            posts::get_post,
            posts::create_post,
            posts::update_post,
        ),
        components(schemas(
            LoginRequest,
            TokenResponse,
            CreateUserRequest,
            UserResponse,
            CreateRightRequest,
            RightResponse,
            CreatePostRequest,
            UpdatePostRequest,
            PostResponse,
            HealthResponse,
        )),
        tags(
            (name = "Health", description = "Service health"),
            (name = "Authentication", description = "Token issuance"),
            (name = "Users", description = "User accounts"),
            (name = "Rights", description = "Access rights"),
            (name = "Posts", description = "Posts"),
        ),
        info(title = "Warden", description = "Multi-tenant resource server with group based access rights"),
        modifiers(&SecurityAddon)
    )]
    struct ApiDoc;

    struct SecurityAddon;

    impl Modify for SecurityAddon {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            if let Some(components) = openapi.components.as_mut() {
                components.add_security_scheme("token", SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(TOKEN_HEADER))))
            }
        }
    }

    ApiDoc::openapi().to_pretty_json().unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_numeric() {
        assert_eq!(parse_id(Some("42".to_string())).unwrap(), 42);
        assert!(matches!(parse_id(Some("abc".to_string())), Err(ApiError::NotFound { .. })));
        assert!(parse_id(None).is_err());
    }

    #[test]
    fn openapi_lists_every_route() {
        let document: serde_json::Value = serde_json::from_str(&generate_openapi_spec()).unwrap();
        let paths = document["paths"].as_object().unwrap();
        for path in ["/health", "/login", "/user", "/right", "/right/{id}", "/post", "/post/{id}"] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
        assert!(document["components"]["securitySchemes"]["token"].is_object());
    }
}
