//! Unified error type for the generation pipeline
//!
//! Every failure that crosses a public boundary is an [`AiError`] carrying one
//! of five fixed kinds. The generation client is the sole point of
//! normalization: raw transport errors never leak unclassified.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, AiError>;

/// Classification taxonomy for pipeline failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Connectivity failure: connect error, DNS, transport timeout
    Network,
    /// The remote service signalled an explicit rate limit
    RateLimit,
    /// 5xx-class or transport-level service failure
    Server,
    /// Malformed or invalid request/response, including template resolution failures
    Validation,
    /// Anything unrecognized
    Unknown,
}

impl ErrorKind {
    /// Whether a caller may reasonably attempt the same request again.
    /// Advisory metadata only; the pipeline performs no automatic retries.
    pub fn retryable(self) -> bool {
        matches!(self, ErrorKind::RateLimit | ErrorKind::Server)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Network => "network",
            ErrorKind::RateLimit => "rate limit",
            ErrorKind::Server => "server",
            ErrorKind::Validation => "validation",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// A classified pipeline error
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct AiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a network (connectivity) error
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// Create a rate-limit error
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    /// Create a server-side failure error
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, message)
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create an unclassified error
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Whether a caller may reasonably retry the failed request
    pub fn retryable(&self) -> bool {
        self.kind.retryable()
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return AiError::network(format!("request failed: {err}"));
        }
        if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                return AiError::rate_limit(format!("rate limit exceeded: {err}"));
            }
            if status.is_server_error() {
                return AiError::server(format!("service failure ({status}): {err}"));
            }
            if status.is_client_error() {
                return AiError::validation(format!("rejected request ({status}): {err}"));
            }
        }
        if err.is_decode() || err.is_body() {
            return AiError::validation(format!("malformed response: {err}"));
        }
        if err.is_request() {
            // Request-phase failures without a status are transport-level
            return AiError::server(format!("transport failure: {err}"));
        }
        AiError::unknown(format!("unclassified transport error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_holds_exactly_for_rate_limit_and_server() {
        assert!(AiError::rate_limit("slow down").retryable());
        assert!(AiError::server("boom").retryable());
        assert!(!AiError::network("offline").retryable());
        assert!(!AiError::validation("bad input").retryable());
        assert!(!AiError::unknown("???").retryable());
    }

    #[test]
    fn kind_serializes_to_fixed_taxonomy_names() {
        let json = serde_json::to_string(&ErrorKind::RateLimit).unwrap();
        assert_eq!(json, "\"RATE_LIMIT\"");
        let json = serde_json::to_string(&ErrorKind::Network).unwrap();
        assert_eq!(json, "\"NETWORK\"");
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = AiError::validation("missing parameter: topic");
        assert_eq!(
            err.to_string(),
            "validation error: missing parameter: topic"
        );
    }
}
