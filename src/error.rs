//! Error taxonomy for the recorder engine.

use thiserror::Error;

/// Errors reported by the session registry, the orchestrator and the rule engine.
///
/// None of these are retried internally; retries belong to the caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecorderError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {0} does not belong to this browser")]
    SessionMismatch(String),

    #[error("Session already exists: {0}")]
    DuplicateSession(String),

    #[error("Browser is no longer available for session {0}")]
    SessionUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Browser failure: {0}")]
    BrowserFailure(String),
}

impl RecorderError {
    /// Short machine-readable name, used as the `error` field of API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            RecorderError::SessionNotFound(_) => "SessionNotFound",
            RecorderError::SessionMismatch(_) => "SessionMismatch",
            RecorderError::DuplicateSession(_) => "DuplicateSession",
            RecorderError::SessionUnavailable(_) => "SessionUnavailable",
            RecorderError::InvalidConfiguration(_) => "InvalidConfiguration",
            RecorderError::BrowserFailure(_) => "BrowserFailure",
        }
    }

    /// Wrap a driver error, keeping the whole context chain in the message.
    pub fn browser(context: &str, err: anyhow::Error) -> Self {
        RecorderError::BrowserFailure(format!("{}: {:#}", context, err))
    }
}

pub type Result<T> = std::result::Result<T, RecorderError>;
