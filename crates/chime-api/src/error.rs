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

  #[error(transparent)]
  Engine(#[from] chime_engine::Error),
}

impl ApiError {
  /// The status an engine error is surfaced with.
  pub fn engine_status(err: &chime_engine::Error) -> StatusCode {
    use chime_engine::Error as E;
    match err {
      E::Core(core) if core.field().is_some() => StatusCode::BAD_REQUEST,
      E::MalformedInbound(_) => StatusCode::BAD_REQUEST,
      E::RecipientNotFound(_) => StatusCode::NOT_FOUND,
      E::SubscriberExists(_) => StatusCode::CONFLICT,
      E::Core(_)
      | E::Store(_)
      | E::NothingToAnswer(_)
      | E::MissingTemplate(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Engine(err) => Self::engine_status(err),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }

    let field = match &self {
      ApiError::Engine(chime_engine::Error::Core(core)) => core.field(),
      _ => None,
    };
    let body = match field {
      Some(field) => json!({ "error": self.to_string(), "field": field }),
      None => json!({ "error": self.to_string() }),
    };
    (status, Json(body)).into_response()
  }
}
