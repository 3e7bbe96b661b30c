use crate::config::MIB;
use crate::models::ErrorResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed. Please use POST with an image.";
pub const READ_FAILURE_MESSAGE: &str = "Failed to read image file. Please try with a different image.";
pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please try again in a few minutes.";
pub const UPSTREAM_REJECTED_MESSAGE: &str = "Invalid image format. Please try with a different image.";
pub const UPSTREAM_UNAVAILABLE_MESSAGE: &str = "Failed to analyze image. Please try again.";

/// Coarse classification of [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    PayloadTooLarge,
    IoFailure,
    UpstreamRateLimited,
    UpstreamRejected,
    UpstreamUnavailable,
    InternalFault,
}

/// Terminal failure of one analysis request.
///
/// The `Display` text may carry internal detail and is only logged. What the
/// caller sees is [`AnalysisError::user_message`].
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("payload too large: {size:?} bytes (limit {limit})")]
    PayloadTooLarge { size: Option<u64>, limit: u64 },

    #[error("encoded payload too large: estimated {estimate} bytes (limit {limit})")]
    EncodedTooLarge { estimate: u64, limit: u64 },

    #[error("failed to read upload: {0}")]
    ReadFailure(String),

    #[error("upstream rate limited")]
    UpstreamRateLimited,

    #[error("upstream rejected request: {0}")]
    UpstreamRejected(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

pub fn as_mb(bytes: u64) -> String {
    format!("{:.2}MB", bytes as f64 / MIB as f64)
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::MethodNotAllowed | AnalysisError::InvalidInput(_) => ErrorKind::InvalidInput,
            AnalysisError::PayloadTooLarge { .. } | AnalysisError::EncodedTooLarge { .. } => {
                ErrorKind::PayloadTooLarge
            }
            AnalysisError::ReadFailure(_) => ErrorKind::IoFailure,
            AnalysisError::UpstreamRateLimited => ErrorKind::UpstreamRateLimited,
            AnalysisError::UpstreamRejected(_) => ErrorKind::UpstreamRejected,
            AnalysisError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            AnalysisError::Internal(_) => ErrorKind::InternalFault,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AnalysisError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AnalysisError::InvalidInput(_)
            | AnalysisError::ReadFailure(_)
            | AnalysisError::UpstreamRejected(_) => StatusCode::BAD_REQUEST,
            AnalysisError::PayloadTooLarge { .. } | AnalysisError::EncodedTooLarge { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            AnalysisError::UpstreamRateLimited => StatusCode::TOO_MANY_REQUESTS,
            AnalysisError::UpstreamUnavailable(_) | AnalysisError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::MethodNotAllowed => METHOD_NOT_ALLOWED_MESSAGE.to_string(),
            AnalysisError::InvalidInput(message) => message.clone(),
            AnalysisError::PayloadTooLarge { size: Some(size), limit } => format!(
                "Image too large. Maximum size is {}. Current size: {}",
                as_mb(*limit),
                as_mb(*size)
            ),
            AnalysisError::PayloadTooLarge { size: None, limit } => {
                format!("Image too large. Maximum size is {}.", as_mb(*limit))
            }
            AnalysisError::EncodedTooLarge { estimate, limit } => format!(
                "Image too large for processing (estimated encoded size {} exceeds {}). Please use a smaller image.",
                as_mb(*estimate),
                as_mb(*limit)
            ),
            AnalysisError::ReadFailure(_) => READ_FAILURE_MESSAGE.to_string(),
            AnalysisError::UpstreamRateLimited => RATE_LIMITED_MESSAGE.to_string(),
            AnalysisError::UpstreamRejected(_) => UPSTREAM_REJECTED_MESSAGE.to_string(),
            AnalysisError::UpstreamUnavailable(_) => UPSTREAM_UNAVAILABLE_MESSAGE.to_string(),
            AnalysisError::Internal(message) => message.clone(),
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Analysis failed with {} ({:?}): {}", status, self.kind(), self);
        } else {
            warn!("Analysis rejected with {} ({:?}): {}", status, self.kind(), self);
        }
        let error_response = ErrorResponse {
            error: self.user_message(),
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AnalysisError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(AnalysisError::InvalidInput("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AnalysisError::ReadFailure("eof".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AnalysisError::PayloadTooLarge { size: Some(1), limit: 0 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AnalysisError::EncodedTooLarge { estimate: 1, limit: 0 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(AnalysisError::UpstreamRateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(AnalysisError::UpstreamRejected("bad".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AnalysisError::UpstreamUnavailable("502".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AnalysisError::Internal("boom".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(AnalysisError::MethodNotAllowed.kind(), ErrorKind::InvalidInput);
        assert_eq!(AnalysisError::ReadFailure(String::new()).kind(), ErrorKind::IoFailure);
        assert_eq!(
            AnalysisError::EncodedTooLarge { estimate: 0, limit: 0 }.kind(),
            ErrorKind::PayloadTooLarge
        );
        assert_eq!(AnalysisError::Internal(String::new()).kind(), ErrorKind::InternalFault);
    }

    #[test]
    fn test_user_messages_hide_internal_detail() {
        let err = AnalysisError::UpstreamUnavailable("connection refused to 10.0.0.3".into());
        assert_eq!(err.user_message(), UPSTREAM_UNAVAILABLE_MESSAGE);
        let err = AnalysisError::ReadFailure("stream ended early".into());
        assert_eq!(err.user_message(), READ_FAILURE_MESSAGE);
        let err = AnalysisError::UpstreamRejected("unsupported image".into());
        assert_eq!(err.user_message(), UPSTREAM_REJECTED_MESSAGE);
    }

    #[test]
    fn test_payload_too_large_reports_sizes() {
        let err = AnalysisError::PayloadTooLarge {
            size: Some(12 * MIB + MIB / 2),
            limit: 10 * MIB,
        };
        assert_eq!(
            err.user_message(),
            "Image too large. Maximum size is 10.00MB. Current size: 12.50MB"
        );
        let err = AnalysisError::PayloadTooLarge { size: None, limit: 10 * MIB };
        assert_eq!(err.user_message(), "Image too large. Maximum size is 10.00MB.");
    }

    #[test]
    fn test_internal_echoes_message() {
        let err = AnalysisError::Internal("handler exploded".into());
        assert_eq!(err.user_message(), "handler exploded");
    }
}
