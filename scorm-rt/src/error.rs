//! Error types for scorm-rt
//!
//! [`Error`] is the runtime's failure taxonomy. Every variant except
//! `GradePublish` and `Common` is a caller mistake and leaves stored state
//! untouched. [`ApiError`] maps it onto HTTP for the player.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Runtime error
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or unusable request parameter
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Package version string is neither SCORM 1.2 nor SCORM 2004
    #[error("Unsupported package version: {0:?}")]
    InvalidVersion(String),

    /// Score field that does not parse as a finite number
    #[error("Malformed commit payload: {field} = {value:?} is not a number")]
    MalformedCommitPayload { field: String, value: String },

    /// Score range with no width or max below min
    #[error("Invalid score range: min {min} / max {max}")]
    InvalidScoreRange { min: f64, max: f64 },

    /// Package archive or manifest could not be processed
    #[error("Package upload failed: {0}")]
    PackageUpload(String),

    /// No current user on the request
    #[error("No authenticated user")]
    Unauthenticated,

    /// Authenticated user lacks the role the operation needs
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown block or package
    #[error("Not found: {0}")]
    NotFound(String),

    /// Host rejected or never received the grade
    #[error("Grade publish failed: {0}")]
    GradePublish(String),

    /// Storage, configuration, or I/O failure
    #[error(transparent)]
    Common(#[from] scorm_common::Error),
}

/// Convenience Result type using scorm-rt Error
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP-facing wrapper for [`Error`]
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl From<scorm_common::Error> for ApiError {
    fn from(err: scorm_common::Error) -> Self {
        ApiError(Error::Common(err))
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Error::InvalidVersion(_) => (StatusCode::BAD_REQUEST, "INVALID_VERSION"),
            Error::MalformedCommitPayload { .. } => {
                (StatusCode::BAD_REQUEST, "MALFORMED_COMMIT_PAYLOAD")
            }
            Error::InvalidScoreRange { .. } => (StatusCode::BAD_REQUEST, "INVALID_SCORE_RANGE"),
            Error::PackageUpload(_) => (StatusCode::BAD_REQUEST, "PACKAGE_UPLOAD_FAILURE"),
            Error::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            Error::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::GradePublish(_) => (StatusCode::BAD_GATEWAY, "GRADE_PUBLISH_FAILED"),
            Error::Common(scorm_common::Error::NotFound(_)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::Common(scorm_common::Error::InvalidInput(_)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            Error::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, "{}", self.0);
        } else {
            tracing::debug!(code, "{}", self.0);
        }

        let body = Json(json!({
            "error": self.0.to_string(),
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_are_client_errors() {
        let cases = vec![
            Error::BadRequest("missing name".to_string()),
            Error::InvalidVersion("SCORM3000".to_string()),
            Error::MalformedCommitPayload {
                field: "cmi.core.score.raw".to_string(),
                value: "abc".to_string(),
            },
            Error::InvalidScoreRange { min: 5.0, max: 5.0 },
            Error::PackageUpload("no manifest".to_string()),
        ];
        for err in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_storage_failure_is_server_error() {
        let err = ApiError::from(scorm_common::Error::Internal("disk".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_auth_failures() {
        assert_eq!(ApiError(Error::Unauthenticated).into_response().status(), StatusCode::UNAUTHORIZED);
        let forbidden = ApiError(Error::Forbidden("staff only".to_string()));
        assert_eq!(forbidden.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_publish_failure_is_bad_gateway() {
        let err = ApiError(Error::GradePublish("timeout".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_malformed_message_names_field() {
        let err = Error::MalformedCommitPayload {
            field: "cmi.score.scaled".to_string(),
            value: "half".to_string(),
        };
        assert!(err.to_string().contains("cmi.score.scaled"));
    }
}
