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

use tracing::{error, info};
use warden_api::{config::Config, server::ApiServer};
use warden_core::{StoreBuilder, seed};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting Warden resource server");

    // Load configuration
    let config = Config::from_env();
    info!("Loaded configuration: bind_address={}", config.bind_address);
    let bootstrap_admin = config.bootstrap_admin()?;

    let store = StoreBuilder::new()
        .database_url(&config.database_url)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .create_database(true)
        .run_migrations(true)
        .build()
        .await?;

    if let Some(defaults) = seed::install_defaults(&store, bootstrap_admin).await? {
        info!("Installed default groups {} and {}", defaults.admin_group.id, defaults.user_group.id);
    }

    let server = ApiServer::new(&config, store.clone())?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    };
    server.run(shutdown).await?;

    store.close().await;

    Ok(())
}
