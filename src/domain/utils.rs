//! Domain-specific shared validations and formatting utilities

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::errors::ResourceError;

pub const DEFAULT_MIME_TYPE: &str = "text/plain";
pub const BINARY_MIME_TYPE: &str = "application/octet-stream";
pub const JSON_MIME_TYPE: &str = "application/json";
pub const MIME_TYPE_PATTERN: &str = r"^[a-zA-Z0-9]+/[a-zA-Z0-9\-+.]+$";

fn mime_type_regex() -> &'static Regex {
    static MIME_TYPE: OnceLock<Regex> = OnceLock::new();
    MIME_TYPE.get_or_init(|| Regex::new(MIME_TYPE_PATTERN).expect("static mime type pattern"))
}

pub fn normalize_mime_type(mime_type: Option<String>) -> Result<String, ResourceError> {
    let Some(value) = mime_type else {
        return Ok(DEFAULT_MIME_TYPE.to_string());
    };

    if !mime_type_regex().is_match(&value) {
        return Err(ResourceError::InvalidMimeType(value));
    }

    Ok(value)
}

/// Empty names count as absent.
pub fn normalize_name(name: Option<String>) -> Option<String> {
    name.filter(|value| !value.is_empty())
}

/// Translates a shell-style pattern (`*`, `?`) into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(pattern)
        .replace(r"\*", "[^/]*")
        .replace(r"\?", "[^/]");
    Regex::new(&format!("^{escaped}$"))
}
