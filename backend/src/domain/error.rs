//! Unified error surface for the orchestrator and CLI boundary.
//!
//! Internal ports keep their own narrow error enums (see
//! [`crate::domain::ports`]); this type exists only where a single
//! error surface is genuinely needed, mirroring how deep the teacher's
//! own `domain::error::Error` sits below its many port-specific errors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse-grained error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorCode {
    /// The caller supplied an invalid request.
    InvalidRequest,
    /// The requested resource does not exist.
    NotFound,
    /// The operation conflicts with existing state.
    Conflict,
    /// A downstream dependency is temporarily unavailable.
    ServiceUnavailable,
    /// An unclassified internal failure.
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidRequest => "invalid_request",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::ServiceUnavailable => "service_unavailable",
            Self::InternalError => "internal_error",
        };
        f.write_str(label)
    }
}

/// A classified, user-facing error with an optional trace id for correlation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct Error {
    code: ErrorCode,
    message: String,
    trace_id: Option<String>,
}

impl Error {
    /// Build an error, rejecting an empty message.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorValidationError::EmptyMessage`] if `message` is blank.
    pub fn try_new(
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            trace_id: None,
        })
    }

    /// Attach a trace id, rejecting an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorValidationError::EmptyTraceId`] if `trace_id` is blank.
    pub fn try_with_trace_id(
        mut self,
        trace_id: impl Into<String>,
    ) -> Result<Self, ErrorValidationError> {
        let trace_id = trace_id.into();
        if trace_id.trim().is_empty() {
            return Err(ErrorValidationError::EmptyTraceId);
        }
        self.trace_id = Some(trace_id);
        Ok(self)
    }

    /// Error classification.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Correlation id, when set.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Build an [`ErrorCode::NotFound`] error from a known-non-empty message.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        let message = message.into();
        debug_assert!(!message.trim().is_empty(), "not_found message is empty");
        Self {
            code: ErrorCode::NotFound,
            message,
            trace_id: None,
        }
    }

    /// Build an [`ErrorCode::Conflict`] error from a known-non-empty message.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        let message = message.into();
        debug_assert!(!message.trim().is_empty(), "conflict message is empty");
        Self {
            code: ErrorCode::Conflict,
            message,
            trace_id: None,
        }
    }

    /// Build an [`ErrorCode::ServiceUnavailable`] error from a known-non-empty message.
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        let message = message.into();
        debug_assert!(
            !message.trim().is_empty(),
            "service_unavailable message is empty"
        );
        Self {
            code: ErrorCode::ServiceUnavailable,
            message,
            trace_id: None,
        }
    }

    /// Build an [`ErrorCode::InternalError`] error from a known-non-empty message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        debug_assert!(!message.trim().is_empty(), "internal message is empty");
        Self {
            code: ErrorCode::InternalError,
            message,
            trace_id: None,
        }
    }
}

/// Failures constructing an [`Error`] value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorValidationError {
    /// The message was empty or all whitespace.
    #[error("error message must not be empty")]
    EmptyMessage,
    /// The trace id was empty or all whitespace.
    #[error("trace id must not be empty")]
    EmptyTraceId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn try_new_rejects_blank_message() {
        let error = Error::try_new(ErrorCode::InvalidRequest, "   ");
        assert_eq!(error, Err(ErrorValidationError::EmptyMessage));
    }

    #[rstest]
    fn try_with_trace_id_rejects_blank_id() {
        let error = Error::not_found("missing").try_with_trace_id("  ");
        assert_eq!(error, Err(ErrorValidationError::EmptyTraceId));
    }

    #[rstest]
    fn accessors_round_trip() {
        let error = Error::conflict("duplicate hash")
            .try_with_trace_id("trace-1")
            .expect("trace id should be accepted");
        assert_eq!(error.code(), ErrorCode::Conflict);
        assert_eq!(error.message(), "duplicate hash");
        assert_eq!(error.trace_id(), Some("trace-1"));
    }
}
