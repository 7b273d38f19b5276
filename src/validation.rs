//! Field validation helpers shared by the repositories.
//!
//! Every helper returns [`RepositoryError::Validation`] with a message naming
//! the offending field, so handlers can surface it unchanged as a 400.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value as JsonValue;
use url::Url;

use crate::error::RepositoryError;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_EMAIL_LEN: usize = 100;
pub const MAX_URL_LEN: usize = 255;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex compiles"));

/// Trims `value` and requires it to be non-empty and at most `max` characters.
pub fn required_text(field: &str, value: &str, max: usize) -> Result<String, RepositoryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RepositoryError::validation_error(format!(
            "{field} must not be empty"
        )));
    }
    max_length(field, trimmed, max)?;
    Ok(trimmed.to_string())
}

pub fn max_length(field: &str, value: &str, max: usize) -> Result<(), RepositoryError> {
    if value.chars().count() > max {
        return Err(RepositoryError::validation_error(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Accepts absolute `http`/`https` URLs up to [`MAX_URL_LEN`] characters.
pub fn url(field: &str, value: &str) -> Result<(), RepositoryError> {
    max_length(field, value, MAX_URL_LEN)?;
    match Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(()),
        _ => Err(RepositoryError::validation_error(format!(
            "{field} must be a valid URL"
        ))),
    }
}

pub fn email(value: &str) -> Result<String, RepositoryError> {
    let trimmed = value.trim();
    max_length("email", trimmed, MAX_EMAIL_LEN)?;
    if !EMAIL_RE.is_match(trimmed) {
        return Err(RepositoryError::validation_error("Invalid email"));
    }
    Ok(trimmed.to_string())
}

pub fn password(value: &str) -> Result<(), RepositoryError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(RepositoryError::validation_error(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Requires `{ "primary": "...", "secondary": "..." }` with both values non-empty.
pub fn color_scheme(value: &JsonValue) -> Result<(), RepositoryError> {
    let non_empty = |key: &str| {
        value
            .get(key)
            .and_then(JsonValue::as_str)
            .is_some_and(|s| !s.trim().is_empty())
    };

    if value.is_object() && non_empty("primary") && non_empty("secondary") {
        Ok(())
    } else {
        Err(RepositoryError::validation_error(
            "color_scheme must contain non-empty primary and secondary colors",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_text() {
        assert_eq!(required_text("name", "  Acme ", 10).unwrap(), "Acme");
        assert!(required_text("name", "   ", 10).is_err());
        assert!(required_text("name", "abcdefghijk", 10).is_err());
        // characters, not bytes
        assert!(required_text("name", "ééééé", 5).is_ok());
    }

    #[test]
    fn test_url() {
        assert!(url("logo", "https://cdn.example.com/logo.png").is_ok());
        assert!(url("logo", "ftp://cdn.example.com/logo.png").is_err());
        assert!(url("logo", "not a url").is_err());
        let long = format!("https://example.com/{}", "a".repeat(MAX_URL_LEN));
        assert!(url("logo", &long).is_err());
    }

    #[test]
    fn test_email_and_password() {
        assert_eq!(email(" jane@example.com ").unwrap(), "jane@example.com");
        assert!(email("jane.example.com").is_err());
        assert!(email("jane@localhost").is_err());
        assert!(password("12345").is_err());
        assert!(password("123456").is_ok());
    }

    #[test]
    fn test_color_scheme() {
        assert!(color_scheme(&json!({"primary": "#000", "secondary": "#fff"})).is_ok());
        assert!(color_scheme(&json!({"primary": "#000"})).is_err());
        assert!(color_scheme(&json!({"primary": "", "secondary": "#fff"})).is_err());
        assert!(color_scheme(&json!(["#000", "#fff"])).is_err());
    }
}
