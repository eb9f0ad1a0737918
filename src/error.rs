//! Error types for cmdeploy

use std::fmt;
use thiserror::Error;

/// Result type for cmdeploy operations
pub type Result<T> = std::result::Result<T, OpsError>;

/// Classification of a failure reported by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCode {
    /// The addressed object does not exist
    NotFound,
    /// The object being created is already there
    AlreadyExists,
    /// Credentials were rejected
    Unauthorized,
    /// Any other server-side failure
    Server,
}

impl RemoteCode {
    /// Map an HTTP status and response body to a remote code
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            404 => RemoteCode::NotFound,
            409 => RemoteCode::AlreadyExists,
            401 | 403 => RemoteCode::Unauthorized,
            // The control plane answers duplicate creates with a plain 400.
            400 if body.to_ascii_lowercase().contains("already exists") => {
                RemoteCode::AlreadyExists
            }
            _ => RemoteCode::Server,
        }
    }
}

impl fmt::Display for RemoteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoteCode::NotFound => "not-found",
            RemoteCode::AlreadyExists => "already-exists",
            RemoteCode::Unauthorized => "unauthorized",
            RemoteCode::Server => "server-error",
        };
        write!(f, "{}", s)
    }
}

/// cmdeploy error types
#[derive(Error, Debug)]
pub enum OpsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote call failed: {message}")]
    Remote {
        code: Option<RemoteCode>,
        message: String,
    },

    #[error("{0}")]
    Precondition(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Command {command} failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Host command `{command}` exited with status {status}: {output}")]
    HostCommand {
        command: String,
        status: i32,
        output: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl OpsError {
    /// Build a remote failure with an optional code
    pub fn remote(code: Option<RemoteCode>, message: impl Into<String>) -> Self {
        OpsError::Remote {
            code,
            message: message.into(),
        }
    }

    /// Whether this error is the control plane saying "not found"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OpsError::NotFound(_)
                | OpsError::Remote {
                    code: Some(RemoteCode::NotFound),
                    ..
                }
        )
    }

    /// Whether this error is the control plane saying "already exists"
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            OpsError::Remote {
                code: Some(RemoteCode::AlreadyExists),
                ..
            }
        )
    }

    /// Prefix the message with the step that failed, keeping the remote code
    pub fn context(self, what: &str) -> Self {
        match self {
            OpsError::Remote { code, message } => OpsError::Remote {
                code,
                message: format!("{}.\nError is {}", what, message),
            },
            OpsError::NotFound(message) => OpsError::remote(
                Some(RemoteCode::NotFound),
                format!("{}.\nError is {}", what, message),
            ),
            OpsError::Http(e) => OpsError::remote(None, format!("{}.\nError is {}", what, e)),
            other => other,
        }
    }
}
