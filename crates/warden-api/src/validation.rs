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

//! Input checks applied before anything reaches the store

use crate::error::{ApiError, ApiResult};
use regex::Regex;
use std::sync::LazyLock;

pub const MAX_EMAIL_LENGTH: usize = 256;
pub const MAX_TITLE_LENGTH: usize = 128;
pub const MIN_PASSWORD_LENGTH: usize = 8;

static EMAIL_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

fn invalid(message: impl Into<String>) -> ApiError {
    ApiError::BadRequest { message: message.into() }
}

pub fn validate_email(email: &str) -> ApiResult<()> {
    if email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(invalid(format!("email must be at most {} characters", MAX_EMAIL_LENGTH)));
    }
    let pattern = EMAIL_PATTERN.as_ref().ok_or_else(|| ApiError::InternalServerError {
        message: "email pattern failed to compile".to_string(),
    })?;
    if !pattern.is_match(email) {
        return Err(invalid("email is not a valid address"));
    }
    Ok(())
}

/// Letters and digits only, at least one lowercase, one uppercase and one digit.
pub fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(invalid(format!("password must be at least {} characters", MIN_PASSWORD_LENGTH)));
    }
    if !password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("password may only contain letters and digits"));
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        return Err(invalid("password needs a lowercase letter, an uppercase letter and a digit"));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> ApiResult<()> {
    if title.trim().is_empty() {
        return Err(invalid("title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(invalid(format!("title must be at most {} characters", MAX_TITLE_LENGTH)));
    }
    Ok(())
}
