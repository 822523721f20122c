//! Bulk soft-delete and status changes over many requests of one kind.

use tokio_util::sync::CancellationToken;

use crate::{
  entity::{Accounting, Kind, Status, user},
  prelude::*,
  sv::{
    BatchExecutor,
    batch::BatchResult,
    request,
  },
};

pub struct Bulk<'a> {
  db: &'a DatabaseConnection,
  executor: BatchExecutor,
}

impl<'a> Bulk<'a> {
  pub fn new(db: &'a DatabaseConnection, executor: BatchExecutor) -> Self {
    Self { db, executor }
  }

  /// Staff act on any request, everyone else only on their own.
  fn owner(actor: &user::Model) -> Option<i64> {
    (!actor.is_staff()).then_some(actor.id)
  }

  pub async fn soft_delete(
    &self,
    kind: Kind,
    actor: &user::Model,
    ids: Vec<i64>,
    cancel: &CancellationToken,
  ) -> Result<BatchResult> {
    let owner = Self::owner(actor);
    let db = self.db;

    let result = self
      .executor
      .execute(ids, cancel, |batch| request::soft_delete(db, kind, batch, owner))
      .await;

    info!(
      "Bulk delete of {} requests by user {}: {} affected, {} failed batches",
      kind,
      actor.id,
      result.total_affected,
      result.failed()
    );
    settle(result)
  }

  /// Statuses `to` may be reached from without touching the ledger or the gate.
  pub fn sources(kind: Kind, to: Status) -> Vec<Status> {
    kind
      .statuses()
      .iter()
      .copied()
      .filter(|&from| kind.can_transition(from, to))
      .filter(|&from| {
        matches!(kind.accounting(from, to), Accounting::None | Accounting::Release)
      })
      .collect()
  }

  pub async fn set_status(
    &self,
    kind: Kind,
    actor: &user::Model,
    ids: Vec<i64>,
    to: Status,
    cancel: &CancellationToken,
  ) -> Result<BatchResult> {
    let from = Self::sources(kind, to);
    if from.is_empty() {
      return Err(Error::Validation(format!(
        "{kind} requests cannot be moved to {to} in bulk"
      )));
    }

    let owner = Self::owner(actor);
    let db = self.db;
    let from = &from;

    let result = self
      .executor
      .execute(ids, cancel, |batch| {
        request::set_status(db, kind, batch, from, to, owner)
      })
      .await;

    info!(
      "Bulk move of {} requests to {} by user {}: {} affected",
      kind, to, actor.id, result.total_affected
    );
    settle(result)
  }
}

/// Every executed batch failing is an error. Partial failure is reported in
/// the result.
fn settle(result: BatchResult) -> Result<BatchResult> {
  let failed = result.failed();
  if failed > 0 && failed == result.batches.len() {
    return Err(Error::BatchFailed { failed });
  }
  Ok(result)
}
