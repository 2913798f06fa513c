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

//! Warden core
//!
//! Access-control evaluation and transactional persistence for the Warden resource
//! server. Entities (users, groups, rights, posts) live in SQLite behind a generic
//! repository; bearer tokens resolve to identities whose group rights are checked
//! against (resource type, access, scope) triples.

pub mod access;
pub mod error;
pub mod models;
pub mod password;
pub mod repository;
pub mod seed;
pub mod store;
pub mod token;

pub use access::{AccessEvaluator, Decision, Guarded, Identity, Privilege, PrivilegeSet, Target};
pub use error::{AccessError, AuthError, StoreError};
pub use repository::{Repository, Value};
pub use store::{Store, StoreBuilder};
pub use token::{TokenAuthenticator, TokenSettings};
