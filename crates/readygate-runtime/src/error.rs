use miette::Diagnostic;
use thiserror::Error;

/// Runtime error type for Pod client, probe and controller operations
#[derive(Error, Debug, Diagnostic)]
pub enum RuntimeError {
    /// Pod not found
    #[error("Pod not found: {namespace}/{name}")]
    #[diagnostic(
        code(readygate::runtime::pod_not_found),
        help("The Pod was deleted before it could be reconciled. This is expected and not retried")
    )]
    PodNotFound {
        #[allow(unused)]
        namespace: String,
        #[allow(unused)]
        name: String,
    },

    /// Optimistic concurrency conflict on a write
    #[error("Conflict writing status of pod {namespace}/{name}: {message}")]
    #[diagnostic(
        code(readygate::runtime::conflict),
        help("The Pod changed between read and write. The reconciliation is requeued and will re-read the latest version")
    )]
    Conflict {
        #[allow(unused)]
        namespace: String,
        #[allow(unused)]
        name: String,
        #[allow(unused)]
        message: String,
    },

    /// API server answered with a non-success status
    #[error("{operation} failed with status {status}: {body}")]
    #[diagnostic(
        code(readygate::runtime::api_request_failed),
        help("Check that the service account has get/list on pods and update on pods/status")
    )]
    ApiRequestFailed {
        #[allow(unused)]
        operation: String,
        #[allow(unused)]
        status: u16,
        #[allow(unused)]
        body: String,
    },

    /// Request never produced a response
    #[error("HTTP request failed: {message}")]
    #[diagnostic(
        code(readygate::runtime::transport),
        help("Verify the API server URL is reachable from this process")
    )]
    Transport {
        #[allow(unused)]
        message: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(readygate::runtime::invalid_config), help("{suggestion}"))]
    InvalidConfig {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        suggestion: String,
    },

    /// Core library error
    #[error(transparent)]
    #[diagnostic(transparent)]
    CoreError(#[from] readygate_core::ReadyGateError),

    /// Internal error
    #[error("Internal runtime error: {message}")]
    #[diagnostic(
        code(readygate::runtime::internal_error),
        help("This is likely a bug in readygate-runtime. Please report it with the full error details")
    )]
    InternalError {
        #[allow(unused)]
        message: String,
    },
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    pub fn pod_not_found(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::PodNotFound {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn conflict(
        namespace: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            namespace: namespace.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn api_request_failed(
        operation: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self::ApiRequestFailed {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Whether a later attempt at the same reconciliation can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            RuntimeError::Conflict { .. } | RuntimeError::Transport { .. } => true,
            RuntimeError::ApiRequestFailed { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
