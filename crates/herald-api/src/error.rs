//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The write was accepted but could not be made durable.
  #[error("unavailable: {0}")]
  Unavailable(String),

  #[error("not implemented: {0}")]
  NotImplemented(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

impl From<herald_realtime::Error> for ApiError {
  fn from(e: herald_realtime::Error) -> Self {
    use herald_realtime::Error as E;
    match e {
      E::Unsupported(what) => Self::NotImplemented(format!("{what} is not supported")),
      E::Serialization(e) => Self::BadRequest(e.to_string()),
      other @ (E::Unauthorized | E::NotOpen) => Self::BadRequest(other.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
      ApiError::NotImplemented(m) => (StatusCode::NOT_IMPLEMENTED, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store error while serving request");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
