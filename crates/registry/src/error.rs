//! Error types for service registration.

/// Result type alias for registration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while registering or pinging.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The advertised address can never be reached by peers.
    #[error("register ip can not be {0}")]
    InvalidAddress(String),

    /// This discovery handle already registered a server.
    #[error("server already registered at {path}")]
    AlreadyRegistered {
        /// Path of the existing registration.
        path: String,
    },

    /// HTTP request to the coordination service failed.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The coordination service answered but reports itself unhealthy.
    #[error("coordination service unhealthy: {0}")]
    Unhealthy(String),

    /// Server info could not be encoded.
    #[error("failed to encode server info: {0}")]
    Encode(String),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Whether the input was rejected before anything was sent.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidAddress(_) | Self::AlreadyRegistered { .. })
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}
