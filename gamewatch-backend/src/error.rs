use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;

/// API error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub error: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details: Option<String>,
}

impl ErrorResponse {
  pub fn new(error: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      details: None,
    }
  }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
  /// Log append or tracker upsert failed. Fatal to the request: the ping is
  /// rejected so the upstream server retries, since a skipped ping would
  /// corrupt the diff-based join/leave detection.
  StorageError(gamewatch_db::DbError),
  /// Malformed ping, rejected before any state mutation.
  ValidationError(String),
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    match self {
      AppError::StorageError(db_err) => {
        // Log the detailed error server-side, don't expose it to clients
        tracing::error!(?db_err, "Storage error occurred");

        let error_response =
          ErrorResponse::new("An internal error occurred. Please try again later.");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response)).into_response()
      }
      AppError::ValidationError(msg) => {
        tracing::warn!(validation_error = %msg, "Validation failed");
        let error_response = ErrorResponse::new(msg);
        (StatusCode::BAD_REQUEST, Json(error_response)).into_response()
      }
    }
  }
}

impl From<gamewatch_db::DbError> for AppError {
  fn from(err: gamewatch_db::DbError) -> Self {
    AppError::StorageError(err)
  }
}

impl From<crate::validation::ValidationError> for AppError {
  fn from(err: crate::validation::ValidationError) -> Self {
    AppError::ValidationError(err.to_string())
  }
}
