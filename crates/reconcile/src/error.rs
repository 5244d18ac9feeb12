//! Error types for reconciliation.
//!
//! Errors are categorized so callers can tell an aborted run (cancelled or
//! past its deadline) from a rejected one, and rejected input from a
//! remote failure. None of them are retried here; retry policy belongs to
//! whoever invoked the worker.

use std::fmt;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed diff: unknown tag or a required field missing.
    InvalidInput,
    /// Network or HTTP-level failure talking to the topology server.
    Network,
    /// The server answered but reported failure in its envelope.
    Remote,
    /// The request context was cancelled or its deadline passed.
    Cancelled,
    /// The server answered with something we could not decode.
    Format,
}

impl ErrorCategory {
    /// Whether re-running the same batch later could succeed without
    /// changing the input.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network | Self::Cancelled)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Invalid module diff",
            Self::Network => "Network connectivity issue",
            Self::Remote => "Topology server rejected the request",
            Self::Cancelled => "Request aborted",
            Self::Format => "Invalid server response",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Recompute the diff against the set template and try again",
            Self::Network => "Check the topology server endpoint and re-run the sync",
            Self::Remote => "Fix the reported problem on the server side, then re-run the sync",
            Self::Cancelled => "Re-run the sync; converged modules will be skipped",
            Self::Format => "Check that the endpoint points at a compatible topology server",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while reconciling a set.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The diff carries a tag outside add/remove/changed/unchanged.
    #[error("unexpected diff type: {0}")]
    UnexpectedDiffType(String),

    /// A field required by the diff's tag is absent.
    #[error("{diff_type} diff is missing required field {field}")]
    MissingField {
        /// Tag of the diff.
        diff_type: String,
        /// Wire name of the missing field.
        field: &'static str,
    },

    /// HTTP request failed before an envelope could be read.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The server returned `result == false` or a non-zero code.
    #[error("remote error (code {code}): {message}")]
    Remote {
        /// `bk_error_code` from the envelope.
        code: i64,
        /// `bk_error_msg` from the envelope.
        message: String,
    },

    /// The request context was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// The request context's deadline passed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// Response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A diff failed while syncing a set.
    #[error(
        "sync of set {set_id} (biz {biz_id}) failed at diff #{index} ({diff_type}{}), rid: {rid}",
        module_suffix(.module_id)
    )]
    Sync {
        /// Business the set belongs to.
        biz_id: i64,
        /// Set being reconciled.
        set_id: i64,
        /// Position of the failing diff in the batch.
        index: usize,
        /// Wire tag of the failing diff.
        diff_type: String,
        /// Module the diff targets, when it has one.
        module_id: Option<i64>,
        /// Request id of the run.
        rid: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },
}

fn module_suffix(module_id: &Option<i64>) -> String {
    module_id.map(|id| format!(", module {id}")).unwrap_or_default()
}

impl Error {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Transport {
            message: message.into(),
            status,
        }
    }

    /// Create an application-level error from an envelope's code and message.
    pub fn remote(code: i64, message: impl Into<String>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
        }
    }

    /// The innermost error, skipping any `Sync` wrappers.
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Error::Sync { source, .. } => source.root(),
            other => other,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnexpectedDiffType(_) | Error::MissingField { .. } => {
                ErrorCategory::InvalidInput
            }
            Error::Transport { .. } => ErrorCategory::Network,
            Error::Remote { .. } => ErrorCategory::Remote,
            Error::Cancelled | Error::DeadlineExceeded => ErrorCategory::Cancelled,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Sync { source, .. } => source.category(),
        }
    }

    /// Whether the run was aborted rather than rejected.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.category() == ErrorCategory::Cancelled
    }

    /// Module targeted by the failing diff, if this is a `Sync` error.
    #[must_use]
    pub fn module_id(&self) -> Option<i64> {
        match self {
            Error::Sync { module_id, .. } => *module_id,
            _ => None,
        }
    }

    /// Tag of the failing diff, if this is a `Sync` error.
    #[must_use]
    pub fn diff_type(&self) -> Option<&str> {
        match self {
            Error::Sync { diff_type, .. } => Some(diff_type),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
