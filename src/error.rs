//! Error taxonomy for the document pipeline.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Errors raised while validating, binding, rendering or delivering a document.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Missing or malformed caller input.
    #[error("{0}")]
    Validation(String),

    /// Image payload is not a decodable base64 image.
    #[error("Invalid image encoding: {0}")]
    InvalidImageEncoding(String),

    /// Template references a field the binding context does not provide.
    #[error("Template '{template}' references unbound field '{field}'")]
    Binding { template: String, field: String },

    /// Built-in template could not be parsed.
    #[error("Template '{template}' is malformed: {reason}")]
    TemplateSyntax { template: String, reason: String },

    /// Unknown template identifier.
    #[error("No template named '{0}'")]
    MissingTemplate(String),

    /// Document did not finish loading inside the render bound.
    #[error("Render timed out after {}ms", .0.as_millis())]
    RenderTimeout(Duration),

    /// Rendering backend process could not be started.
    #[error("Rendering backend unavailable: {0}")]
    RenderBackendUnavailable(String),

    /// Backend started but failed to load or print the document.
    #[error("Rendering failed: {0}")]
    RenderFailed(String),

    /// Artifact could not be written under the upload root.
    #[error("Failed to write artifact to {}: {source}", path.display())]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    /// HTTP status code this error surfaces as.
    pub fn status_code(&self) -> u16 {
        match self {
            DocumentError::Validation(_) | DocumentError::InvalidImageEncoding(_) => 400,
            DocumentError::MissingTemplate(_) => 404,
            DocumentError::RenderBackendUnavailable(_) => 503,
            DocumentError::RenderTimeout(_) => 504,
            DocumentError::Binding { .. }
            | DocumentError::TemplateSyntax { .. }
            | DocumentError::RenderFailed(_)
            | DocumentError::SinkWrite { .. } => 500,
        }
    }

    /// True when the caller's input is at fault.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
