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

//! Shared services handed to every request handler

use warden_core::models::{Post, Right, User};
use warden_core::{AccessEvaluator, Repository, Store, TokenAuthenticator, TokenSettings};

/// Everything a handler needs. Cloning shares the underlying store pool.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub authenticator: TokenAuthenticator,
    pub evaluator: AccessEvaluator,
    pub users: Repository<User>,
    pub rights: Repository<Right>,
    pub posts: Repository<Post>,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl AppState {
    pub fn new(store: Store, token_settings: TokenSettings, max_body_size: usize) -> Self {
        Self {
            authenticator: TokenAuthenticator::new(store.clone(), token_settings),
            evaluator: AccessEvaluator::new(),
            users: Repository::new(store.clone()),
            rights: Repository::new(store.clone()),
            posts: Repository::new(store.clone()),
            store,
            max_body_size,
        }
    }
}
