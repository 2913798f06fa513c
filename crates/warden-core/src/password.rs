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

//! Salted password hashing
//!
//! Hashing and verification are CPU bound, so the async entry points move the work onto
//! the blocking thread pool instead of stalling the request executor.

use crate::error::AuthError;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

/// Hash a password with a fresh random salt (PHC string format).
pub fn hash_blocking(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verify `candidate` against a stored PHC hash string.
pub fn verify_blocking(hash: &str, candidate: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(Argon2::default().verify_password(candidate.as_bytes(), &parsed).is_ok())
}

pub async fn hash(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
}

pub async fn verify(hash: String, candidate: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify_blocking(&hash, &candidate))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn hashes_are_salted() {
        let first = hash("Password1".to_string()).await.unwrap();
        let second = hash("Password1".to_string()).await.unwrap();

        assert_ne!(first, second);
        assert!(verify(first, "Password1".to_string()).await.unwrap());
        assert!(verify(second, "Password1".to_string()).await.unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(verify_blocking("not-a-phc-string", "x"), Err(AuthError::Hashing(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn round_trip(password in "[a-zA-Z0-9]{1,24}", other in "[a-zA-Z0-9]{1,24}") {
            let hashed = hash_blocking(&password).unwrap();
            prop_assert!(verify_blocking(&hashed, &password).unwrap());
            if other != password {
                prop_assert!(!verify_blocking(&hashed, &other).unwrap());
            }
        }
    }
}
