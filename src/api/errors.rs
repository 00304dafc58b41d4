use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::errors::WorkflowError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
    error: &'static str,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(String),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Persistence(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Persistence(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::BadRequest(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Persistence(_) => "persistence_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        tracing::debug!(kind = err.kind(), error = %err, "Workflow operation rejected");
        match err {
            WorkflowError::Validation(message) => ApiError::BadRequest(message),
            WorkflowError::NotFound(message) => ApiError::NotFound(message),
            WorkflowError::Forbidden(message) => ApiError::Forbidden(message),
            WorkflowError::Conflict(message) => ApiError::Conflict(message),
            WorkflowError::Persistence { context, source } => {
                tracing::error!(error = %source, "{context}");
                ApiError::Persistence(context.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.kind();
        let message = match self {
            ApiError::Unauthorized(message) => message.to_string(),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                message
            }
            ApiError::Forbidden(message)
            | ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message)
            | ApiError::Persistence(message) => message,
        };

        let mut response =
            (status, Json(ErrorResponse { success: false, message, error })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;

    use crate::repositories::StoreError;
    use crate::services::errors::WorkflowError;
    use crate::test_support::read_json;

    #[tokio::test]
    async fn workflow_errors_keep_their_kind_and_message() {
        let cases = [
            (WorkflowError::validation("bad"), StatusCode::BAD_REQUEST, "validation_error"),
            (WorkflowError::not_found("gone"), StatusCode::NOT_FOUND, "not_found"),
            (WorkflowError::forbidden("nope"), StatusCode::FORBIDDEN, "forbidden"),
            (WorkflowError::conflict("twice"), StatusCode::CONFLICT, "conflict"),
        ];

        for (err, status, kind) in cases {
            let message = err.to_string();
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
            let body = read_json(response).await;
            assert_eq!(body["success"], false);
            assert_eq!(body["error"], kind);
            assert_eq!(body["message"], message);
        }
    }

    #[tokio::test]
    async fn persistence_errors_hide_the_driver_message() {
        let err = WorkflowError::Persistence {
            context: "Failed to store grade",
            source: StoreError::Unavailable("connection reset by peer".to_string()),
        };

        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["error"], "persistence_error");
        assert_eq!(body["message"], "Failed to store grade");
    }

    #[tokio::test]
    async fn unauthorized_sets_bearer_challenge() {
        let response = ApiError::Unauthorized("Invalid authentication credentials").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
        let body = read_json(response).await;
        assert_eq!(body["error"], "unauthorized");
    }
}
