//! Mapping of pipeline errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reframe_core::PipelineError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error returned by every media handler.
#[derive(Debug)]
pub struct ApiError(pub PipelineError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: ErrorDetail {
                kind: self.0.kind(),
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(PipelineError::NoCropDetected).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(PipelineError::validation("No input file provided")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(PipelineError::Engine {
                message: "Conversion failed!".to_string()
            })
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError(PipelineError::Timeout { timeout_secs: 5 }).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
