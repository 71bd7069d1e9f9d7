// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for Readygate operations
#[derive(Error, Debug, Diagnostic)]
pub enum ReadyGateError {
    /// A required field is missing on a resource
    #[error("Resource is missing required field: {field}")]
    #[diagnostic(
        code(readygate::missing_field),
        help("The API server returned a Pod without {field}. Check that the object is a complete Pod")
    )]
    MissingField {
        #[allow(unused)]
        field: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(readygate::serialization_error),
        help("Ensure the resource format is valid JSON or YAML")
    )]
    SerializationError {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for Readygate core operations
pub type Result<T> = std::result::Result<T, ReadyGateError>;

impl ReadyGateError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn serialization_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source,
        }
    }
}
