//! Muninn error types

use crate::providers::classify::{FailureKind, classify_message};

/// Muninn error types
#[derive(Debug, thiserror::Error)]
pub enum MuninnError {
    // Storage errors
    #[error("storage error: {0}")]
    Storage(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no provider configured")]
    NoProvider,

    /// Every provider in the chain failed or was unavailable.
    ///
    /// The display string is the fixed user-safe message for `kind`; raw
    /// vendor detail is never carried here, only logged at the failure site.
    #[error("{}", kind.user_message())]
    Exhausted {
        kind: FailureKind,
        attempts: Vec<AttemptFailure>,
    },

    #[error("request cancelled")]
    Cancelled,
}

impl MuninnError {
    /// The failure class behind an exhausted chain, if this is one.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            MuninnError::Exhausted { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// One failed (or skipped) provider attempt, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub provider: String,
    pub kind: FailureKind,
}

/// Failure reported by a [`ProviderAdapter`](crate::providers::ProviderAdapter).
///
/// Adapters usually just wrap the vendor's error text; the kind is then
/// derived from well-known markers in it. Adapters that already know the
/// class (e.g. from an HTTP status) can set it explicitly.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    kind: Option<FailureKind>,
    message: String,
}

impl ProviderError {
    /// A failure classified from its message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
        }
    }

    /// A failure with an explicit kind.
    pub fn with_kind(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::RateLimited, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::PayloadTooLarge, message)
    }

    pub fn tool_call_invalid(message: impl Into<String>) -> Self {
        Self::with_kind(FailureKind::ToolCallInvalid, message)
    }

    /// The failure class: explicit if set, otherwise classified from the message.
    pub fn kind(&self) -> FailureKind {
        self.kind.unwrap_or_else(|| classify_message(&self.message))
    }

    /// Raw vendor detail. Meant for logs only.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
