//! Lax resource URI values
//!
//! Resources accept either a raw string or an already parsed URL. Strings are
//! normalized once at construction: `file://` strings become file URLs, every
//! other string becomes a generic URL.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;
use url::Url;

use crate::domain::errors::ResourceError;

const FILE_SCHEME_PREFIX: &str = "file://";

/// A normalized resource URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceUri {
    File(Url),
    Any(Url),
}

impl ResourceUri {
    pub fn parse(raw: &str) -> Result<Self, ResourceError> {
        let url = Url::parse(raw).map_err(|err| ResourceError::InvalidUri {
            uri: raw.to_string(),
            reason: err.to_string(),
        })?;

        if raw.starts_with(FILE_SCHEME_PREFIX) {
            Ok(Self::File(url))
        } else {
            Ok(Self::Any(url))
        }
    }

    /// Dispatches on the JSON kind of `value`; only strings are accepted.
    pub fn from_value(value: &Value) -> Result<Self, ResourceError> {
        match value {
            Value::String(raw) => Self::parse(raw),
            other => Err(ResourceError::UnsupportedUriValue(json_kind(other).to_string())),
        }
    }

    pub fn as_url(&self) -> &Url {
        match self {
            Self::File(url) | Self::Any(url) => url,
        }
    }

    pub fn as_str(&self) -> &str {
        self.as_url().as_str()
    }

    pub fn scheme(&self) -> &str {
        self.as_url().scheme()
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResourceUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl From<Url> for ResourceUri {
    fn from(url: Url) -> Self {
        if url.scheme() == "file" {
            Self::File(url)
        } else {
            Self::Any(url)
        }
    }
}

/// Input accepted wherever a resource URI is expected.
#[derive(Debug, Clone)]
pub enum UriInput {
    Text(String),
    Url(ResourceUri),
}

impl UriInput {
    pub fn normalize(self) -> Result<ResourceUri, ResourceError> {
        match self {
            Self::Text(raw) => ResourceUri::parse(&raw),
            Self::Url(uri) => Ok(uri),
        }
    }
}

impl From<&str> for UriInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for UriInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<ResourceUri> for UriInput {
    fn from(value: ResourceUri) -> Self {
        Self::Url(value)
    }
}

impl From<Url> for UriInput {
    fn from(value: Url) -> Self {
        Self::Url(ResourceUri::from(value))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn file_strings_become_file_urls() {
        let uri = ResourceUri::parse("file://test_dir/example.py").expect("valid uri");
        assert!(uri.is_file());
        assert_eq!(uri.to_string(), "file://test_dir/example.py");
    }

    #[test]
    fn other_schemes_become_generic_urls() {
        let uri = ResourceUri::parse("dir://test_dir").expect("valid uri");
        assert!(!uri.is_file());
        assert_eq!(uri.scheme(), "dir");
        assert_eq!(uri.to_string(), "dir://test_dir");
    }

    #[test]
    fn structured_urls_pass_through() {
        let original = ResourceUri::parse("resource://services/snapshot").expect("valid uri");
        let normalized = UriInput::from(original.clone())
            .normalize()
            .expect("pass through");
        assert_eq!(normalized, original);
    }

    #[test]
    fn string_without_scheme_is_rejected() {
        let error = ResourceUri::parse("just-a-name").expect_err("relative uri must fail");
        assert!(matches!(error, ResourceError::InvalidUri { .. }));
    }

    #[test]
    fn non_string_json_values_are_rejected() {
        let error = ResourceUri::from_value(&json!(42)).expect_err("number must fail");
        assert!(error.to_string().contains("number"));

        let error = ResourceUri::from_value(&json!({"uri": "x"})).expect_err("object must fail");
        assert!(matches!(error, ResourceError::UnsupportedUriValue(kind) if kind == "object"));
    }
}
