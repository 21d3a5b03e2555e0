use axum::{
    Json,
    extract::{
        Path,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use divesite_db::ValidationError;

/// Error returned by every handler. Rendered as `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Authentication credentials were not provided.")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("Not found.")]
    NotFound,
    #[error("A server error occurred.")]
    Internal,
}

pub type ApiResult<T> = Result<T, ApiError>;

/// JSON request body whose parse errors come back as 400s.
pub type JsonBody<T> = WithRejection<Json<T>, ApiError>;

/// Path parameters whose parse errors come back as 400s.
pub type PathParams<T> = WithRejection<Path<T>, ApiError>;

impl ApiError {
    pub fn forbidden() -> Self {
        Self::Forbidden("You do not have permission to perform this action.".into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<ValidationError>() {
            Some(invalid) => Self::BadRequest(invalid.0.clone()),
            None => {
                error!("Internal error: {:#}", err);
                Self::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        if rejection.status() == StatusCode::BAD_REQUEST {
            Self::BadRequest(rejection.body_text())
        } else {
            error!("Path extraction failed: {}", rejection.body_text());
            Self::Internal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_become_bad_requests() {
        let err: ApiError = anyhow::Error::new(ValidationError::new("Too close to an existing divesite")).into();
        assert!(matches!(&err, ApiError::BadRequest(msg) if msg == "Too close to an existing divesite"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn other_errors_are_hidden() {
        let err: ApiError = anyhow::anyhow!("disk on fire").into();
        assert!(matches!(err, ApiError::Internal));
        assert_eq!(err.to_string(), "A server error occurred.");
    }
}
