//! Error types for the media module.

use thiserror::Error;

use broadcast_ipc::ErrorPayload;

/// An error raised by the broadcast engine.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{domain} error {code}: {message}")]
pub struct EngineError {
    /// Engine error code.
    pub code: i64,

    /// Error domain or category.
    pub domain: String,

    /// Human readable message.
    pub message: String,

    /// Component that raised the error.
    pub source_description: Option<String>,

    /// Whether the session can no longer continue.
    pub is_fatal: bool,
}

impl EngineError {
    /// Create a non-fatal error.
    pub fn new(code: i64, domain: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            domain: domain.into(),
            message: message.into(),
            source_description: None,
            is_fatal: false,
        }
    }

    /// Mark the error fatal.
    pub fn fatal(mut self) -> Self {
        self.is_fatal = true;
        self
    }

    /// Attach a description of the failing component.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_description = Some(source.into());
        self
    }

    /// Convert into the payload delivered to the host.
    pub fn to_payload(&self, session_id: &str) -> ErrorPayload {
        ErrorPayload {
            code: self.code,
            domain: self.domain.clone(),
            detail: self.message.clone(),
            source: self.source_description.clone(),
            is_fatal: self.is_fatal,
            session_id: session_id.to_string(),
        }
    }
}

/// Errors that can occur while resolving an overlay image.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The image could not be decoded.
    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// The image could not be downloaded.
    #[error("Image fetch failed: {0}")]
    Fetch(String),

    /// The URI is neither a readable file nor a supported URL.
    #[error("Unsupported image URI: {0}")]
    UnsupportedUri(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_carries_every_field() {
        let error = EngineError::new(-1, "Device", "Camera disconnected")
            .fatal()
            .with_source("camera:builtin:back-wide");

        let payload = error.to_payload("session-7");
        assert_eq!(payload.code, -1);
        assert_eq!(payload.domain, "Device");
        assert_eq!(payload.detail, "Camera disconnected");
        assert_eq!(payload.source.as_deref(), Some("camera:builtin:back-wide"));
        assert!(payload.is_fatal);
        assert_eq!(payload.session_id, "session-7");
    }
}
