//! Resource base entity
//!
//! Every resource carries validated metadata (`ResourceMeta`) and produces its
//! content on demand through the async [`Resource::read`] capability.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use rust_mcp_sdk::schema::{
    BlobResourceContents, ReadResourceContent, Resource as ResourceDescriptor,
    TextResourceContents,
};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{
    errors::ResourceError,
    uri::{ResourceUri, UriInput},
    utils::{normalize_mime_type, normalize_name},
};

/// Validated resource metadata.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawResourceMeta")]
pub struct ResourceMeta {
    uri: ResourceUri,
    name: String,
    description: Option<String>,
    mime_type: String,
}

impl ResourceMeta {
    pub fn new(uri: impl Into<UriInput>) -> Result<Self, ResourceError> {
        Self::builder().uri(uri).build()
    }

    pub fn builder() -> ResourceMetaBuilder {
        ResourceMetaBuilder::default()
    }

    pub fn uri(&self) -> &ResourceUri {
        &self.uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn to_descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor {
            annotations: None,
            description: self.description.clone(),
            icons: vec![],
            meta: None,
            mime_type: Some(self.mime_type.clone()),
            name: self.name.clone(),
            size: None,
            title: None,
            uri: self.uri.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResourceMetaBuilder {
    uri: Option<UriInput>,
    name: Option<String>,
    description: Option<String>,
    mime_type: Option<String>,
}

impl ResourceMetaBuilder {
    pub fn uri(mut self, uri: impl Into<UriInput>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Only fills in the mime type when none was set explicitly.
    pub(crate) fn default_mime_type(mut self, mime_type: &str) -> Self {
        if self.mime_type.is_none() {
            self.mime_type = Some(mime_type.to_string());
        }
        self
    }

    pub fn build(self) -> Result<ResourceMeta, ResourceError> {
        let name = normalize_name(self.name);
        let uri = match (self.uri, name.is_some()) {
            (Some(uri), _) => uri.normalize()?,
            (None, true) => return Err(ResourceError::MissingUri),
            (None, false) => return Err(ResourceError::MissingName),
        };

        let name = match name {
            Some(name) => name,
            None => Some(uri.to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ResourceError::MissingName)?,
        };

        Ok(ResourceMeta {
            uri,
            name,
            description: self.description,
            mime_type: normalize_mime_type(self.mime_type)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResourceMeta {
    #[serde(default)]
    uri: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "mime_type")]
    mime_type: Option<String>,
}

impl TryFrom<RawResourceMeta> for ResourceMeta {
    type Error = ResourceError;

    fn try_from(raw: RawResourceMeta) -> Result<Self, Self::Error> {
        let mut builder = ResourceMeta::builder();
        if let Some(uri) = raw.uri.as_ref() {
            builder = builder.uri(ResourceUri::from_value(uri)?);
        }
        if let Some(name) = raw.name {
            builder = builder.name(name);
        }
        if let Some(description) = raw.description {
            builder = builder.description(description);
        }
        if let Some(mime_type) = raw.mime_type {
            builder = builder.mime_type(mime_type);
        }
        builder.build()
    }
}

/// Content produced by a single read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceContent {
    Text(String),
    Binary(Vec<u8>),
}

impl ResourceContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }

    pub fn into_read_content(self, uri: &str, mime_type: &str) -> ReadResourceContent {
        match self {
            Self::Text(text) => ReadResourceContent::from(TextResourceContents {
                meta: None,
                mime_type: Some(mime_type.to_string()),
                text,
                uri: uri.to_string(),
            }),
            Self::Binary(data) => ReadResourceContent::from(BlobResourceContents {
                blob: STANDARD.encode(data),
                meta: None,
                mime_type: Some(mime_type.to_string()),
                uri: uri.to_string(),
            }),
        }
    }
}

/// Conversion from a producer's output into resource content.
pub trait IntoResourceContent {
    fn into_content(self) -> Result<ResourceContent, ResourceError>;
}

impl IntoResourceContent for ResourceContent {
    fn into_content(self) -> Result<ResourceContent, ResourceError> {
        Ok(self)
    }
}

impl IntoResourceContent for String {
    fn into_content(self) -> Result<ResourceContent, ResourceError> {
        Ok(ResourceContent::Text(self))
    }
}

impl IntoResourceContent for &'static str {
    fn into_content(self) -> Result<ResourceContent, ResourceError> {
        Ok(ResourceContent::Text(self.to_string()))
    }
}

impl IntoResourceContent for Vec<u8> {
    fn into_content(self) -> Result<ResourceContent, ResourceError> {
        Ok(ResourceContent::Binary(self))
    }
}

impl IntoResourceContent for Vec<String> {
    fn into_content(self) -> Result<ResourceContent, ResourceError> {
        Value::from(self).into_content()
    }
}

impl IntoResourceContent for Value {
    fn into_content(self) -> Result<ResourceContent, ResourceError> {
        match self {
            Value::String(text) => Ok(ResourceContent::Text(text)),
            other => serde_json::to_string_pretty(&other)
                .map(ResourceContent::Text)
                .map_err(|err| ResourceError::read("<json>", err)),
        }
    }
}

#[async_trait]
pub trait Resource: Send + Sync {
    fn meta(&self) -> &ResourceMeta;

    /// Fetches the content. Implementations must not cache between calls.
    async fn read(&self) -> Result<ResourceContent, ResourceError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::utils::DEFAULT_MIME_TYPE;

    #[test]
    fn name_defaults_to_normalized_uri() {
        let meta = ResourceMeta::new("dir://test_dir").expect("valid resource");
        assert_eq!(meta.name(), "dir://test_dir");
        assert_eq!(meta.name(), meta.uri().to_string());
        assert_eq!(meta.mime_type(), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn empty_name_falls_back_to_uri() {
        let meta = ResourceMeta::builder()
            .uri("file://test_dir/example.py")
            .name("")
            .build()
            .expect("valid resource");
        assert_eq!(meta.name(), "file://test_dir/example.py");
        assert!(meta.uri().is_file());
    }

    #[test]
    fn explicit_name_is_kept() {
        let meta = ResourceMeta::builder()
            .uri("resource://logs/recent")
            .name("Recent Logs")
            .description("last hour")
            .mime_type("application/json")
            .build()
            .expect("valid resource");
        assert_eq!(meta.name(), "Recent Logs");
        assert_eq!(meta.description(), Some("last hour"));
        assert_eq!(meta.mime_type(), "application/json");
    }

    #[test]
    fn neither_name_nor_uri_fails() {
        let error = ResourceMeta::builder().build().expect_err("must fail");
        assert!(matches!(error, ResourceError::MissingName));
    }

    #[test]
    fn name_without_uri_fails() {
        let error = ResourceMeta::builder()
            .name("orphan")
            .build()
            .expect_err("must fail");
        assert!(matches!(error, ResourceError::MissingUri));
    }

    #[test]
    fn invalid_mime_type_fails() {
        let error = ResourceMeta::builder()
            .uri("dir://test_dir")
            .mime_type("plain")
            .build()
            .expect_err("must fail");
        assert!(matches!(error, ResourceError::InvalidMimeType(_)));
    }

    #[test]
    fn deserializes_with_lax_uri() {
        let meta: ResourceMeta = serde_json::from_value(json!({
            "uri": "file://test_dir/readme.md",
            "mimeType": "text/markdown"
        }))
        .expect("valid resource json");
        assert!(meta.uri().is_file());
        assert_eq!(meta.name(), "file://test_dir/readme.md");
        assert_eq!(meta.mime_type(), "text/markdown");
    }

    #[test]
    fn deserialize_rejects_non_string_uri() {
        let error = serde_json::from_value::<ResourceMeta>(json!({ "uri": 7 }))
            .expect_err("number uri must fail");
        assert!(error.to_string().contains("expected str or URL"));
    }

    #[test]
    fn descriptor_mirrors_metadata() {
        let meta = ResourceMeta::builder()
            .uri("dir://test_dir")
            .description("List the files in the test directory")
            .build()
            .expect("valid resource");
        let descriptor = meta.to_descriptor();
        assert_eq!(descriptor.uri, "dir://test_dir");
        assert_eq!(descriptor.name, "dir://test_dir");
        assert_eq!(descriptor.mime_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn json_values_render_as_text() {
        let content = vec!["a.txt".to_string(), "b.txt".to_string()]
            .into_content()
            .expect("json content");
        let parsed: Vec<String> =
            serde_json::from_str(content.as_text().expect("text content")).expect("json array");
        assert_eq!(parsed, vec!["a.txt", "b.txt"]);

        let content = json!("plain").into_content().expect("string content");
        assert_eq!(content, ResourceContent::Text("plain".to_string()));
    }
}
