use thiserror::Error;

/// Errors returned by artifact store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The target folder does not exist (or is not visible to us).
    #[error("folder not found: {0}")]
    FolderNotFound(String),

    /// No artifact with the given id exists.
    #[error("artifact not found: {0}")]
    NotFound(String),

    /// The backend refused the request.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The call did not complete within the configured timeout.
    #[error("storage operation timed out: {0}")]
    Timeout(String),

    /// Reading or writing the local file failed.
    #[error("local i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure, with the remote status when known.
    #[error("storage backend error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Backend {
        status: Option<u16>,
        message: String,
    },
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            status: None,
            message: message.into(),
        }
    }

    /// Map a remote HTTP status onto the matching variant.
    pub fn from_status(status: u16, target: &str, message: impl Into<String>) -> Self {
        match status {
            403 => Self::AccessDenied(target.to_owned()),
            404 => Self::NotFound(target.to_owned()),
            _ => Self::Backend {
                status: Some(status),
                message: message.into(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
