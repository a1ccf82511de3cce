//! Error types for the osf_explorer library.

use thiserror::Error;

/// Main error type for osf_explorer operations.
#[derive(Error, Debug)]
pub enum OsfError {
    /// No session, or the session token is missing, expired or revoked.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Non-2xx response or transport failure. Transport failures use status 0.
    #[error("Remote error {status}: {message}")]
    RemoteError { status: u16, message: String },

    /// The server answered with a body we could not make sense of.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Local filesystem failure during upload or download.
    #[error("Local I/O error: {0}")]
    LocalIo(#[from] std::io::Error),

    /// Network request error.
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid URL in configuration or in a server-provided link.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The authorization flow ended without a token (denied, cancelled, forged).
    #[error("Login failed: {0}")]
    LoginFailed(String),

    /// Operation is not valid in the current login state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The node is not (or no longer) part of the local tree.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// The remote API does not offer this action for the node.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Custom error message.
    #[error("{0}")]
    Custom(String),
}

impl OsfError {
    /// True when the failure means the token is no longer usable.
    ///
    /// OSF answers 401 for missing, expired and revoked tokens. 403 is a plain
    /// permission problem and keeps the session alive.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            OsfError::Unauthenticated => true,
            OsfError::RemoteError { status, .. } => *status == 401,
            _ => false,
        }
    }

    /// Collapse transport-level errors into the remote error shape.
    pub(crate) fn into_remote(self) -> Self {
        match self {
            OsfError::RequestError(e) => OsfError::RemoteError {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            },
            OsfError::JsonError(e) => OsfError::ParseError(e.to_string()),
            other => other,
        }
    }

    /// An owned copy of the error, for operations joined by several callers.
    ///
    /// Transport errors are not cloneable and come out in their remote shape.
    pub(crate) fn replicate(&self) -> Self {
        match self {
            OsfError::Unauthenticated => OsfError::Unauthenticated,
            OsfError::RemoteError { status, message } => OsfError::RemoteError {
                status: *status,
                message: message.clone(),
            },
            OsfError::ParseError(m) => OsfError::ParseError(m.clone()),
            OsfError::LocalIo(e) => OsfError::LocalIo(std::io::Error::new(e.kind(), e.to_string())),
            OsfError::RequestError(e) => OsfError::RemoteError {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            },
            OsfError::JsonError(e) => OsfError::ParseError(e.to_string()),
            OsfError::InvalidUrl(e) => OsfError::InvalidUrl(*e),
            OsfError::LoginFailed(m) => OsfError::LoginFailed(m.clone()),
            OsfError::InvalidState(m) => OsfError::InvalidState(m.clone()),
            OsfError::NodeNotFound(m) => OsfError::NodeNotFound(m.clone()),
            OsfError::Unsupported(m) => OsfError::Unsupported(m.clone()),
            OsfError::Custom(m) => OsfError::Custom(m.clone()),
        }
    }
}

/// Result type alias for osf_explorer operations.
pub type Result<T> = std::result::Result<T, OsfError>;
