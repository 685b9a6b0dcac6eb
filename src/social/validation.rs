// Input rules for accounts, profiles and posts.
//
// Each check trims its input and returns the cleaned value, or a FieldError
// naming the offending field. `FieldErrors` collects several checks so a
// request reports every bad field at once.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Serialize;

use super::error::SocialError;

pub const MAX_POST_CHARS: usize = 280;
pub const MAX_DISPLAY_NAME_CHARS: usize = 50;
pub const MAX_BIO_CHARS: usize = 160;
pub const MIN_PASSWORD_CHARS: usize = 6;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,30}$").expect("valid username regex"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Accumulates field errors across several checks.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the value on success, record the error otherwise.
    pub fn check<T>(&mut self, result: Result<T, FieldError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.0.push(e);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<FieldErrors> for SocialError {
    fn from(errors: FieldErrors) -> Self {
        SocialError::Validation(errors.0)
    }
}

fn bounded(
    field: &'static str,
    raw: &str,
    min: usize,
    max: usize,
) -> Result<String, FieldError> {
    let value = raw.trim();
    let len = value.chars().count();
    if len < min || len > max {
        let message = if min == 0 {
            format!("must be at most {max} characters")
        } else {
            format!("must be between {min} and {max} characters")
        };
        return Err(FieldError::new(field, message));
    }
    Ok(value.to_string())
}

/// Post text: 1 to 280 characters after trimming.
pub fn post_content(raw: &str) -> Result<String, FieldError> {
    bounded("content", raw, 1, MAX_POST_CHARS)
}

/// Display name: 1 to 50 characters after trimming.
pub fn display_name(raw: &str) -> Result<String, FieldError> {
    bounded("displayName", raw, 1, MAX_DISPLAY_NAME_CHARS)
}

/// Bio: up to 160 characters after trimming; empty clears it.
pub fn bio(raw: &str) -> Result<String, FieldError> {
    bounded("bio", raw, 0, MAX_BIO_CHARS)
}

pub fn username(raw: &str) -> Result<String, FieldError> {
    let value = raw.trim();
    if !USERNAME_RE.is_match(value) {
        return Err(FieldError::new(
            "username",
            "must be 3-30 letters, digits or underscores",
        ));
    }
    Ok(value.to_string())
}

/// Email, trimmed and lowercased.
pub fn email(raw: &str) -> Result<String, FieldError> {
    let value = raw.trim().to_lowercase();
    if !EMAIL_RE.is_match(&value) {
        return Err(FieldError::new("email", "must be a valid email address"));
    }
    Ok(value)
}

pub fn password(raw: &str) -> Result<(), FieldError> {
    if raw.chars().count() < MIN_PASSWORD_CHARS {
        return Err(FieldError::new(
            "password",
            format!("must be at least {MIN_PASSWORD_CHARS} characters"),
        ));
    }
    Ok(())
}
