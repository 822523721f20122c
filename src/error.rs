//! Error types for the points service

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::entity::{Kind, Status};

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] sea_orm::DbErr),

  #[error("missing or malformed identity")]
  Unauthorized,

  #[error("not allowed to act on this resource")]
  Forbidden,

  #[error("user not found")]
  UserNotFound,

  #[error("user is banned or deleted")]
  UserIneligible,

  #[error("request not found")]
  RequestNotFound,

  #[error("cannot move request from {from} to {to}")]
  InvalidTransition { from: Status, to: Status },

  #[error("request was modified concurrently")]
  Conflict,

  #[error("{0}")]
  Validation(String),

  #[error("usage projection for {kind} failed: {reason}")]
  Projection { kind: Kind, reason: String },

  #[error("usage projection did not finish within {0:?}")]
  ProjectionTimeout(std::time::Duration),

  #[error("no rows matched")]
  NothingMatched,

  #[error("all {failed} executed batches failed")]
  BatchFailed { failed: usize },

  #[error("internal error: {0}")]
  Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::Unauthorized => StatusCode::UNAUTHORIZED,
      Error::Forbidden | Error::UserIneligible => StatusCode::FORBIDDEN,
      Error::UserNotFound | Error::RequestNotFound | Error::NothingMatched => {
        StatusCode::NOT_FOUND
      }
      Error::InvalidTransition { .. } | Error::Conflict => StatusCode::CONFLICT,
      Error::Validation(_) => StatusCode::BAD_REQUEST,
      Error::Projection { .. } | Error::ProjectionTimeout(_) => {
        StatusCode::SERVICE_UNAVAILABLE
      }
      Error::Database(_) | Error::BatchFailed { .. } | Error::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };

    // infrastructure details stay in the logs
    let message = match &self {
      Error::Database(err) => {
        tracing::error!("Database error: {}", err);
        "Database error".to_string()
      }
      Error::Internal(err) => {
        tracing::error!("Internal error: {}", err);
        "Internal error".to_string()
      }
      other => other.to_string(),
    };

    let body = json::json!({
      "success": false,
      "error": message
    });

    (status, Json(body)).into_response()
  }
}
