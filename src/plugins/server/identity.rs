use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{entity::user, prelude::*, state::AppState};

/// Set by the upstream auth layer.
const USER_ID_HEADER: &str = "x-user-id";

/// The user a request acts as.
pub struct Actor(pub user::Model);

impl FromRequestParts<Arc<AppState>> for Actor {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self> {
    let id: i64 = parts
      .headers
      .get(USER_ID_HEADER)
      .and_then(|value| value.to_str().ok())
      .and_then(|value| value.trim().parse().ok())
      .ok_or(Error::Unauthorized)?;

    let user = app.sv().user.by_id(id).await?.ok_or(Error::Unauthorized)?;
    if user.deleted_at.is_some() {
      return Err(Error::Unauthorized);
    }

    Ok(Actor(user))
  }
}

/// Staff-only routes.
pub struct Staff(pub user::Model);

impl FromRequestParts<Arc<AppState>> for Staff {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self> {
    let Actor(user) = Actor::from_request_parts(parts, app).await?;
    if !user.is_staff() {
      return Err(Error::Forbidden);
    }
    Ok(Staff(user))
  }
}
