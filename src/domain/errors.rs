use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("either name or uri must be provided")]
    MissingName,
    #[error("uri is required")]
    MissingUri,
    #[error("invalid uri {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error("expected str or URL, got {0}")]
    UnsupportedUriValue(String),
    #[error("invalid mime type: {0}")]
    InvalidMimeType(String),
    #[error("invalid uri template: {0}")]
    InvalidTemplate(String),
    #[error("unknown resource: {0}")]
    NotFound(String),
    #[error("failed to read resource {uri}: {message}")]
    Read { uri: String, message: String },
}

impl ResourceError {
    pub fn read(uri: impl Into<String>, message: impl ToString) -> Self {
        Self::Read {
            uri: uri.into(),
            message: message.to_string(),
        }
    }

    /// Construction-time failures, as opposed to lookup or read failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingName
                | Self::MissingUri
                | Self::InvalidUri { .. }
                | Self::UnsupportedUriValue(_)
                | Self::InvalidMimeType(_)
                | Self::InvalidTemplate(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    NotFound(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("tool execution failed: {0}")]
    Execution(String),
}

impl ToolError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn execution(message: impl ToString) -> Self {
        Self::Execution(message.to_string())
    }
}
