use std::{fmt, time::Duration};

use shared::{domain::HistoryId, error::ValidationError};
use thiserror::Error;

/// Failure of a single remote round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("history item {0} not found")]
    NotFound(HistoryId),
    #[error("service responded with status {status}: {message}")]
    Service { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unreadable service response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            GatewayError::Decode(value.to_string())
        } else {
            GatewayError::Transport(value.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Rephrase,
    SaveHistory,
    LoadHistory,
    DeleteHistory,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Rephrase => "rephrase",
            Operation::SaveHistory => "save history",
            Operation::LoadHistory => "load history",
            Operation::DeleteHistory => "delete history item",
        })
    }
}

/// Coarse failure class callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Service,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a rephrase is already in progress")]
    Busy,
    #[error("history item {0} is not in the loaded history")]
    UnknownHistoryItem(HistoryId),
    #[error("history item {0} not found")]
    NotFound(HistoryId),
    #[error("{operation} failed: {source}")]
    Service {
        operation: Operation,
        source: GatewayError,
    },
    #[error("{operation} timed out after {}s", timeout.as_secs())]
    Timeout {
        operation: Operation,
        timeout: Duration,
    },
}

impl SessionError {
    pub(crate) fn from_gateway(operation: Operation, source: GatewayError) -> Self {
        match source {
            GatewayError::NotFound(id) => SessionError::NotFound(id),
            source => SessionError::Service { operation, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Validation(_)
            | SessionError::Busy
            | SessionError::UnknownHistoryItem(_) => ErrorKind::Validation,
            SessionError::NotFound(_) => ErrorKind::NotFound,
            SessionError::Service { .. } | SessionError::Timeout { .. } => ErrorKind::Service,
        }
    }

    /// One-line text suitable for a transient notification.
    pub fn notification(&self) -> String {
        match self {
            SessionError::Validation(ValidationError::BlankText) => {
                "Please enter some text to rephrase".to_string()
            }
            SessionError::Busy => "Please wait for the current rephrase to finish".to_string(),
            SessionError::UnknownHistoryItem(_) => {
                "That history item is no longer available".to_string()
            }
            SessionError::NotFound(_) => "History item not found".to_string(),
            SessionError::Service { operation, .. } | SessionError::Timeout { operation, .. } => {
                match operation {
                    Operation::Rephrase => "Failed to rephrase text. Please try again.",
                    Operation::SaveHistory => "Failed to save history",
                    Operation::LoadHistory => "Failed to load history",
                    Operation::DeleteHistory => "Failed to delete history item",
                }
                .to_string()
            }
        }
    }
}
