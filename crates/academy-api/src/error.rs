//! API error type and [`axum::response::IntoResponse`] implementation.

use std::error::Error as StdError;

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

  /// The request conflicts with the current state of the resource.
  #[error("conflict: {0}")]
  Conflict(String),

  /// `If-Match` did not name the current representation.
  #[error("precondition failed")]
  PreconditionFailed,

  /// Well-formed input that the domain rules reject.
  #[error("unprocessable: {0}")]
  Unprocessable(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn StdError + Send + Sync>),
}

impl ApiError {
  /// Classify a store error. Domain failures anywhere in the source chain are
  /// mapped to their client-facing status; anything else is a server error.
  pub fn from_store<E>(err: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(&err);
    while let Some(e) = cur {
      if let Some(core) = e.downcast_ref::<academy_core::Error>() {
        return Self::from_core(core);
      }
      cur = e.source();
    }
    Self::Store(Box::new(err))
  }

  fn from_core(err: &academy_core::Error) -> Self {
    use academy_core::Error as E;

    let message = err.to_string();
    match err {
      e if e.is_not_found() => Self::NotFound(message),
      E::Validation(_) => Self::BadRequest(message),
      E::StarsOutOfRange { .. } | E::UnknownCriterion(_) | E::ScoreOutOfRange { .. } => {
        Self::Unprocessable(message)
      }
      _ => Self::Conflict(message),
    }
  }
}

impl From<academy_core::Error> for ApiError {
  fn from(err: academy_core::Error) -> Self { Self::from_core(&err) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::PreconditionFailed => (StatusCode::PRECONDITION_FAILED, self.to_string()),
      ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
