//! Failure classification and sanitization.
//!
//! Vendor errors are free text. They are matched against a fixed set of
//! case-insensitive markers to get a [`FailureKind`], and each kind maps to
//! exactly one user-safe message. Raw vendor text never reaches the caller.

use serde::{Deserialize, Serialize};

use crate::error::AttemptFailure;

/// Why a provider attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    PayloadTooLarge,
    ToolCallInvalid,
    /// The provider had no constructed adapter.
    ProviderUnavailable,
    Timeout,
    Unknown,
}

/// Markers checked in order; the first kind with a matching marker wins.
const MARKERS: &[(FailureKind, &[&str])] = &[
    (
        FailureKind::RateLimited,
        &[
            "429",
            "quota",
            "rate limit",
            "rate_limit",
            "ratelimit",
            "resource exhausted",
            "resource_exhausted",
            "too many requests",
        ],
    ),
    (
        FailureKind::PayloadTooLarge,
        &[
            "413",
            "payload too large",
            "request too large",
            "tokens per minute",
            "context length",
            "context_length",
            "maximum context",
        ],
    ),
    (
        FailureKind::ToolCallInvalid,
        &[
            "tool call",
            "tool_call",
            "tool_use_failed",
            "function call",
            "failed to call a function",
        ],
    ),
    (
        FailureKind::Timeout,
        &["timed out", "timeout", "deadline exceeded"],
    ),
];

impl FailureKind {
    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::PayloadTooLarge => "payload_too_large",
            FailureKind::ToolCallInvalid => "tool_call_invalid",
            FailureKind::ProviderUnavailable => "provider_unavailable",
            FailureKind::Timeout => "timeout",
            FailureKind::Unknown => "unknown",
        }
    }

    /// The fixed message shown to end users for this kind.
    pub fn user_message(self) -> &'static str {
        match self {
            FailureKind::RateLimited => {
                "The assistant is busy right now. Please wait a moment and try again."
            }
            FailureKind::PayloadTooLarge => {
                "This conversation is too long for the assistant to process. \
                 Please start a new conversation or shorten your question."
            }
            FailureKind::ToolCallInvalid => {
                "The assistant could not complete the data lookup needed for this question. \
                 Please rephrase and try again."
            }
            FailureKind::ProviderUnavailable => {
                "The assistant is temporarily unavailable. Please try again later."
            }
            FailureKind::Timeout => "The assistant took too long to respond. Please try again.",
            FailureKind::Unknown => {
                "The assistant could not process your request. Please try again."
            }
        }
    }

    /// Every kind, in declaration order.
    pub fn all() -> [FailureKind; 6] {
        [
            FailureKind::RateLimited,
            FailureKind::PayloadTooLarge,
            FailureKind::ToolCallInvalid,
            FailureKind::ProviderUnavailable,
            FailureKind::Timeout,
            FailureKind::Unknown,
        ]
    }

    /// Whether the kind says something specific about the failure.
    fn is_informative(self) -> bool {
        !matches!(self, FailureKind::Unknown | FailureKind::ProviderUnavailable)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify raw vendor error text.
pub fn classify_message(message: &str) -> FailureKind {
    let lowered = message.to_lowercase();
    MARKERS
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| lowered.contains(m)))
        .map_or(FailureKind::Unknown, |(kind, _)| *kind)
}

/// Pick the kind reported to the caller for an exhausted chain.
///
/// The last informative failure wins, since it is the one closest to what
/// the user will see next time. Without one, the last failure; with no
/// attempts at all, [`FailureKind::ProviderUnavailable`].
pub fn sanitize(attempts: &[AttemptFailure]) -> FailureKind {
    attempts
        .iter()
        .rev()
        .map(|a| a.kind)
        .find(|k| k.is_informative())
        .or_else(|| attempts.last().map(|a| a.kind))
        .unwrap_or(FailureKind::ProviderUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(provider: &str, kind: FailureKind) -> AttemptFailure {
        AttemptFailure {
            provider: provider.into(),
            kind,
        }
    }

    #[test]
    fn classifies_markers_case_insensitively() {
        assert_eq!(
            classify_message("HTTP 429 Too Many Requests"),
            FailureKind::RateLimited
        );
        assert_eq!(
            classify_message("RESOURCE_EXHAUSTED: quota exceeded"),
            FailureKind::RateLimited
        );
        assert_eq!(
            classify_message("This model's maximum context length is 8192 tokens"),
            FailureKind::PayloadTooLarge
        );
        assert_eq!(
            classify_message("tool_use_failed: bad arguments"),
            FailureKind::ToolCallInvalid
        );
        assert_eq!(
            classify_message("upstream Deadline Exceeded"),
            FailureKind::Timeout
        );
        assert_eq!(classify_message("segfault"), FailureKind::Unknown);
        assert_eq!(classify_message(""), FailureKind::Unknown);
    }

    #[test]
    fn sanitizer_prefers_last_informative() {
        let attempts = [
            attempt("a", FailureKind::RateLimited),
            attempt("b", FailureKind::Timeout),
            attempt("c", FailureKind::Unknown),
            attempt("d", FailureKind::ProviderUnavailable),
        ];
        assert_eq!(sanitize(&attempts), FailureKind::Timeout);
    }

    #[test]
    fn sanitizer_falls_back_to_last_then_unavailable() {
        let attempts = [
            attempt("a", FailureKind::ProviderUnavailable),
            attempt("b", FailureKind::Unknown),
        ];
        assert_eq!(sanitize(&attempts), FailureKind::Unknown);
        assert_eq!(sanitize(&[]), FailureKind::ProviderUnavailable);
    }

    #[test]
    fn user_messages_carry_no_markers() {
        for kind in FailureKind::all() {
            let msg = kind.user_message();
            assert_eq!(
                classify_message(msg),
                FailureKind::Unknown,
                "message for {kind} leaks a marker: {msg}"
            );
        }
    }
}
