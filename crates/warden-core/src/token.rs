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

//! Opaque bearer tokens: issuance on login and resolution to an identity

use crate::access::Identity;
use crate::error::{AuthError, StoreError};
use crate::models::{AccessToken, AccessTokenField, Group, NewAccessToken, User, UserField};
use crate::repository::Repository;
use crate::store::Store;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{info, warn};

/// Attempts at issuing a token before a value collision is reported
const MAX_ISSUE_ATTEMPTS: usize = 3;

/// Token lifetime and shape
#[derive(Debug, Clone)]
pub struct TokenSettings {
    /// Age after which a token no longer authenticates
    pub ttl: Duration,

    /// Number of random bytes behind every token
    pub length: usize,

    /// Reject expired tokens on resolution. Disabling this keeps tokens valid forever.
    pub enforce_expiry: bool,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(24),
            length: 32,
            enforce_expiry: true,
        }
    }
}

/// Generate a URL-safe token from `length` bytes of system randomness.
pub fn generate_token(rng: &SystemRandom, length: usize) -> Result<String, AuthError> {
    let mut bytes = vec![0u8; length];
    rng.fill(&mut bytes).map_err(|_| AuthError::Randomness)?;
    Ok(URL_SAFE_NO_PAD.encode(&bytes))
}

/// Issues tokens to users and resolves presented tokens back to identities
#[derive(Clone)]
pub struct TokenAuthenticator {
    settings: TokenSettings,
    rng: SystemRandom,
    users: Repository<User>,
    groups: Repository<Group>,
    tokens: Repository<AccessToken>,
}

impl TokenAuthenticator {
    pub fn new(store: Store, settings: TokenSettings) -> Self {
        Self {
            settings,
            rng: SystemRandom::new(),
            users: Repository::new(store.clone()),
            groups: Repository::new(store.clone()),
            tokens: Repository::new(store),
        }
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// Check credentials and issue a fresh token.
    pub async fn login(&self, email: &str, password: &str) -> Result<AccessToken, AuthError> {
        let user = self.users.get_by_field(UserField::Email, email).await?.into_iter().next().ok_or(AuthError::UnknownEmail)?;

        if !user.check_password(password).await? {
            warn!("Wrong password for user {}", user.id);
            return Err(AuthError::WrongPassword);
        }

        let token = self.issue(&user).await?;
        info!("User {} logged in", user.id);
        Ok(token)
    }

    /// Persist a new random token for `user`.
    ///
    /// A collision on the token value is retried with fresh randomness.
    pub async fn issue(&self, user: &User) -> Result<AccessToken, AuthError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let new_token = NewAccessToken {
                token: generate_token(&self.rng, self.settings.length)?,
                user_id: user.id,
                creation_time: Utc::now(),
            };

            match self.tokens.insert(new_token).await {
                Ok(token) => return Ok(token),
                Err(StoreError::AlreadyExists { .. }) if attempt < MAX_ISSUE_ATTEMPTS => {
                    warn!("Token value collision, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Resolve a presented token to the identity of its owner, group included.
    pub async fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        let access_token = self.tokens.get_by_field(AccessTokenField::Token, token).await?.into_iter().next().ok_or(AuthError::TokenNotFound)?;

        if self.settings.enforce_expiry && access_token.is_expired(self.settings.ttl) {
            return Err(AuthError::TokenExpired);
        }

        let user = self
            .users
            .get_by_id(access_token.user_id)
            .await?
            .ok_or(AuthError::IdentityGone { user_id: access_token.user_id })?;

        let group = match user.group_id {
            Some(group_id) => self.groups.get_by_id(group_id).await?,
            None => None,
        };

        Ok(Identity::new(user, group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Access, NewGroup, NewRight, NewUser, ResourceType, Right, Scope};

    async fn setup(settings: TokenSettings) -> (Store, TokenAuthenticator, User) {
        let store = Store::temporary().await;
        let rights = Repository::<Right>::new(store.clone());
        let groups = Repository::<Group>::new(store.clone());
        let users = Repository::<User>::new(store.clone());

        let right = rights.insert(NewRight::new(ResourceType::Post, Access::Read, Scope::All)).await.unwrap();
        let group = groups.insert(NewGroup::new("readers", &[right])).await.unwrap();
        let user = users.insert(NewUser::with_password("reader@example.com", "Reader123", Some(group.id)).await.unwrap()).await.unwrap();

        let authenticator = TokenAuthenticator::new(store.clone(), settings);
        (store, authenticator, user)
    }

    #[test]
    fn generated_tokens_are_distinct_and_url_safe() {
        let rng = SystemRandom::new();
        let first = generate_token(&rng, 32).unwrap();
        let second = generate_token(&rng, 32).unwrap();

        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn login_issues_resolvable_token() {
        let (_, authenticator, user) = setup(TokenSettings::default()).await;

        let token = authenticator.login("reader@example.com", "Reader123").await.unwrap();
        assert_eq!(token.user_id, user.id);

        let identity = authenticator.resolve(&token.token).await.unwrap();
        assert_eq!(identity.user.id, user.id);
        let group = identity.group.expect("group is loaded eagerly");
        assert_eq!(group.rights.len(), 1);
    }

    #[tokio::test]
    async fn login_failures_are_distinguished() {
        let (_, authenticator, _) = setup(TokenSettings::default()).await;

        assert!(matches!(authenticator.login("nobody@example.com", "Reader123").await, Err(AuthError::UnknownEmail)));
        assert!(matches!(authenticator.login("reader@example.com", "Reader124").await, Err(AuthError::WrongPassword)));
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let (_, authenticator, _) = setup(TokenSettings::default()).await;
        assert!(matches!(authenticator.resolve("no-such-token").await, Err(AuthError::TokenNotFound)));
    }

    #[tokio::test]
    async fn expired_token_is_rejected_while_row_remains() {
        let (store, authenticator, user) = setup(TokenSettings::default()).await;
        let tokens = Repository::<AccessToken>::new(store);

        let stale = tokens
            .insert(NewAccessToken {
                token: "stale-token".to_string(),
                user_id: user.id,
                creation_time: Utc::now() - Duration::hours(25),
            })
            .await
            .unwrap();

        assert!(matches!(authenticator.resolve(&stale.token).await, Err(AuthError::TokenExpired)));
        assert_eq!(tokens.get_by_id(stale.id).await.unwrap(), Some(stale));
    }

    #[tokio::test]
    async fn expiry_can_be_disabled() {
        let settings = TokenSettings {
            enforce_expiry: false,
            ..TokenSettings::default()
        };
        let (store, authenticator, user) = setup(settings).await;

        Repository::<AccessToken>::new(store)
            .insert(NewAccessToken {
                token: "old-token".to_string(),
                user_id: user.id,
                creation_time: Utc::now() - Duration::days(30),
            })
            .await
            .unwrap();

        assert_eq!(authenticator.resolve("old-token").await.unwrap().user.id, user.id);
    }
}
