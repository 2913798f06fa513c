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

//! HTTP server implementation using Hyper

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::router::Router;
use crate::state::AppState;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use warden_core::Store;

/// API server using Hyper
pub struct ApiServer {
    bind_address: SocketAddr,
    router: Arc<Router>,
}

impl ApiServer {
    /// Create a server over an already opened store
    pub fn new(config: &Config, store: Store) -> ApiResult<Self> {
        let bind_address: SocketAddr = config.bind_address.parse().map_err(|e| ApiError::Config {
            message: format!("bind address '{}': {}", config.bind_address, e),
        })?;

        let state = AppState::new(store, config.token_settings(), config.max_body_size);
        let router = Arc::new(Router::new(state)?);

        info!("API server created");

        Ok(Self { bind_address, router })
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Accept connections until `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> ApiResult<()> {
        let listener = TcpListener::bind(self.bind_address).await?;

        info!("Warden listening on http://{}", self.bind_address);
        info!("OpenAPI document available at http://{}/openapi.json", self.bind_address);

        tokio::pin!(shutdown);

        loop {
            let (stream, remote_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
            };

            let io = TokioIo::new(stream);
            let router = self.router.clone();

            // Spawn a task to handle the connection
            tokio::task::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let router = router.clone();
                    async move { Ok::<_, Infallible>(router.handle(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unusable_bind_address_is_a_config_error() {
        let config = Config {
            bind_address: "not-an-address".to_string(),
            ..Config::default()
        };
        let result = ApiServer::new(&config, Store::temporary().await);
        assert!(matches!(result, Err(ApiError::Config { .. })));

        let config = Config {
            bind_address: "127.0.0.1:0".to_string(),
            ..Config::default()
        };
        let server = ApiServer::new(&config, Store::temporary().await).unwrap();
        assert_eq!(server.bind_address().ip().to_string(), "127.0.0.1");
    }
}
