use std::{future::Future, sync::Arc};

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::identity::{Actor, Staff};
use crate::{
  entity::{Kind, Status, ledger_entry},
  prelude::*,
  state::AppState,
  sv::{
    batch::BatchResult,
    gate::{GateView, KindUsage},
    lifecycle::Decision,
    usage::CostUpdate,
  },
};

impl IntoResponse for Decision {
  fn into_response(self) -> Response {
    match self {
      Decision::Applied { status } => {
        let body = json::json!({ "success": true, "status": status });
        (StatusCode::OK, Json(body)).into_response()
      }
      Decision::Expired => {
        let body = json::json!({
          "success": false,
          "error": "quota window expired",
          "action": "renew"
        });
        (StatusCode::FORBIDDEN, Json(body)).into_response()
      }
      Decision::Insufficient { needed_points } => {
        let body = json::json!({
          "success": false,
          "error": "insufficient points",
          "needed_points": needed_points,
          "action": "top_up"
        });
        (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
      }
    }
  }
}

pub async fn health() -> &'static str {
  "OK"
}

#[derive(Debug, Serialize)]
pub struct PointsRes {
  pub balance: i64,
  pub outstanding: i64,
  pub available: i64,
  pub usage: Vec<KindUsage>,
  pub is_expired: bool,
  pub expires_at: DateTime,
}

pub async fn points(
  State(app): State<Arc<AppState>>,
  Actor(user): Actor,
) -> Result<Json<PointsRes>> {
  let sv = app.sv();

  let balance = sv.ledger.balance(user.id).await?;
  let usage = sv.gate.usage(&user).await?;
  let outstanding = usage.total()?;

  Ok(Json(PointsRes {
    balance,
    outstanding,
    available: balance.saturating_sub(outstanding),
    usage: usage.kinds,
    is_expired: user.is_expired(Utc::now().naive_utc()),
    expires_at: user.expires_at,
  }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
  #[serde(default = "HistoryQuery::default_limit")]
  pub limit: u64,
}

impl HistoryQuery {
  fn default_limit() -> u64 {
    50
  }
}

pub async fn ledger(
  State(app): State<Arc<AppState>>,
  Actor(user): Actor,
  Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ledger_entry::Model>>> {
  let entries = app.sv().ledger.history(user.id, query.limit.min(500)).await?;
  Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct GateReq {
  pub cost: i64,
  /// Staff may check on behalf of another user
  pub user_id: Option<i64>,
}

pub async fn gate_check(
  State(app): State<Arc<AppState>>,
  Actor(actor): Actor,
  Json(req): Json<GateReq>,
) -> Result<Json<GateView>> {
  let sv = app.sv();

  let user = match req.user_id {
    Some(id) if id != actor.id => {
      if !actor.is_staff() {
        return Err(Error::Forbidden);
      }
      sv.user.get(id).await?
    }
    _ => actor,
  };

  let check = sv.gate.check(&user, req.cost).await?;
  Ok(Json(check.into()))
}

pub async fn submit(
  State(app): State<Arc<AppState>>,
  Actor(actor): Actor,
  Path((kind, id)): Path<(Kind, i64)>,
) -> Result<Decision> {
  app.sv().lifecycle.submit(kind, id, &actor).await
}

#[derive(Debug, Deserialize)]
pub struct TransitionReq {
  pub status: Status,
}

pub async fn transition(
  State(app): State<Arc<AppState>>,
  Actor(actor): Actor,
  Path((kind, id)): Path<(Kind, i64)>,
  Json(req): Json<TransitionReq>,
) -> Result<Decision> {
  app.sv().lifecycle.transition(kind, id, &actor, req.status).await
}

pub async fn update_cost(
  State(app): State<Arc<AppState>>,
  Actor(actor): Actor,
  Path((kind, id)): Path<(Kind, i64)>,
  Json(update): Json<CostUpdate>,
) -> Result<Decision> {
  app.sv().lifecycle.update_cost(kind, id, &actor, update).await
}

#[derive(Debug, Serialize)]
pub struct BulkRes {
  pub success: bool,
  pub total_affected: u64,
  pub failed_batches: usize,
  pub skipped_batches: usize,
}

impl From<BatchResult> for BulkRes {
  fn from(result: BatchResult) -> Self {
    Self {
      success: true,
      total_affected: result.total_affected,
      failed_batches: result.failed(),
      skipped_batches: result.skipped,
    }
  }
}

/// Runs a bulk operation on its own task. Dropping the request (client gone)
/// cancels it: batches in flight finish, no new ones start.
async fn spawn_bulk<F, Fut>(app: Arc<AppState>, op: F) -> Result<Json<BulkRes>>
where
  F: FnOnce(Arc<AppState>, CancellationToken) -> Fut,
  Fut: Future<Output = Result<BatchResult>> + Send + 'static,
{
  let cancel = CancellationToken::new();
  let _guard = cancel.clone().drop_guard();

  let result = tokio::spawn(op(app, cancel))
    .await
    .map_err(|err| Error::Internal(format!("bulk task failed: {err}")))??;

  if result.nothing_matched() {
    return Err(Error::NothingMatched);
  }
  Ok(Json(result.into()))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteReq {
  pub ids: Vec<i64>,
}

pub async fn bulk_delete(
  State(app): State<Arc<AppState>>,
  Actor(actor): Actor,
  Path(kind): Path<Kind>,
  Json(req): Json<BulkDeleteReq>,
) -> Result<Json<BulkRes>> {
  spawn_bulk(app, move |app, cancel| async move {
    app.sv().bulk.soft_delete(kind, &actor, req.ids, &cancel).await
  })
  .await
}

#[derive(Debug, Deserialize)]
pub struct BulkStatusReq {
  pub ids: Vec<i64>,
  pub status: Status,
}

pub async fn bulk_status(
  State(app): State<Arc<AppState>>,
  Actor(actor): Actor,
  Path(kind): Path<Kind>,
  Json(req): Json<BulkStatusReq>,
) -> Result<Json<BulkRes>> {
  spawn_bulk(app, move |app, cancel| async move {
    app.sv().bulk.set_status(kind, &actor, req.ids, req.status, &cancel).await
  })
  .await
}

#[derive(Debug, Deserialize)]
pub struct CreditReq {
  pub points: i64,
  pub note: Option<String>,
}

pub async fn credit(
  State(app): State<Arc<AppState>>,
  Staff(staff): Staff,
  Path(user_id): Path<i64>,
  Json(req): Json<CreditReq>,
) -> Result<Json<ledger_entry::Model>> {
  let sv = app.sv();
  sv.user.get(user_id).await?;

  let entry = sv.ledger.credit(user_id, req.points, req.note).await?;
  info!("User {} credited {} points by {}", user_id, req.points, staff.id);
  Ok(Json(entry))
}

/// Manual correction, e.g. a refunded deposit.
pub async fn debit(
  State(app): State<Arc<AppState>>,
  Staff(staff): Staff,
  Path(user_id): Path<i64>,
  Json(req): Json<CreditReq>,
) -> Result<Json<ledger_entry::Model>> {
  let sv = app.sv();
  sv.user.get(user_id).await?;

  let entry = sv.ledger.debit(user_id, req.points, req.note).await?;
  warn!("User {} debited {} points by {}", user_id, req.points, staff.id);
  Ok(Json(entry))
}

#[derive(Debug, Deserialize)]
pub struct BanReq {
  pub banned: bool,
}

pub async fn ban(
  State(app): State<Arc<AppState>>,
  Staff(staff): Staff,
  Path(user_id): Path<i64>,
  Json(req): Json<BanReq>,
) -> Result<Json<json::Value>> {
  app.sv().user.set_banned(user_id, req.banned).await?;
  info!("User {} banned={} by {}", user_id, req.banned, staff.id);
  Ok(Json(json::json!({ "success": true, "banned": req.banned })))
}

#[derive(Debug, Deserialize)]
pub struct ExtendReq {
  pub days: u64,
}

#[derive(Debug, Serialize)]
pub struct ExtendRes {
  pub success: bool,
  pub expires_at: DateTime,
}

pub async fn extend(
  State(app): State<Arc<AppState>>,
  Staff(staff): Staff,
  Path(user_id): Path<i64>,
  Json(req): Json<ExtendReq>,
) -> Result<Json<ExtendRes>> {
  let expires_at = app.sv().user.extend(user_id, req.days).await?;
  info!("User {} extended by {} days by {}", user_id, req.days, staff.id);
  Ok(Json(ExtendRes { success: true, expires_at }))
}
