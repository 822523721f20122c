//! Request lifecycle: gated commits, settlement and cost updates.

use serde::Serialize;

use crate::{
  entity::{Accounting, EntryType, Kind, Status, user},
  prelude::*,
  sv::{
    self, Gate,
    gate::{GateCheck, GateMode, UserLocks},
    request::{self, Header},
    usage::{CostUpdate, Registry, sum_points},
  },
};

/// Outcome of a gated operation. Expiry and insufficiency are answers, not
/// failures: they need different fixes (renewal vs. top-up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
  Applied { status: Status },
  Expired,
  Insufficient { needed_points: i64 },
}

impl Decision {
  fn rejected(check: &GateCheck) -> Option<Self> {
    if check.is_expired {
      Some(Decision::Expired)
    } else {
      check
        .shortfall()
        .map(|needed_points| Decision::Insufficient { needed_points })
    }
  }
}

pub struct Lifecycle<'a> {
  db: &'a DatabaseConnection,
  registry: &'a Registry,
  gate: Gate<'a>,
  locks: &'a UserLocks,
  mode: GateMode,
}

impl<'a> Lifecycle<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    registry: &'a Registry,
    gate: Gate<'a>,
    locks: &'a UserLocks,
    mode: GateMode,
  ) -> Self {
    Self { db, registry, gate, locks, mode }
  }

  /// Loads a live request and resolves who pays for it.
  async fn resolve(
    &self,
    kind: Kind,
    id: i64,
    actor: &user::Model,
  ) -> Result<(Header, user::Model)> {
    let header = request::header(self.db, kind, id)
      .await?
      .filter(|h| h.deleted_at.is_none())
      .ok_or(Error::RequestNotFound)?;

    let owner = if header.user_id == actor.id {
      actor.clone()
    } else if actor.is_staff() {
      sv::User::new(self.db).get(header.user_id).await?
    } else {
      return Err(Error::Forbidden);
    };

    if !owner.is_eligible() {
      return Err(Error::UserIneligible);
    }

    Ok((header, owner))
  }

  /// Runs the gate for `cost` against the owner. Post-paid accounts acting on
  /// their own requests skip the balance check but not the expiry check.
  async fn gate(
    &self,
    actor: &user::Model,
    owner: &user::Model,
    cost: i64,
  ) -> Result<Option<Decision>> {
    if owner.is_expired(Utc::now().naive_utc()) {
      info!("Gate rejected user {}: quota window expired", owner.id);
      return Ok(Some(Decision::Expired));
    }
    if actor.id == owner.id && actor.bypasses_gate() {
      debug!("Gate bypassed for post-paid user {}", actor.id);
      return Ok(None);
    }

    let check = self.gate.check(owner, cost).await?;
    let decision = Decision::rejected(&check);
    if let Some(decision) = &decision {
      info!("Gate rejected {} points for user {}: {:?}", cost, owner.id, decision);
    }
    Ok(decision)
  }

  async fn cost_of(&self, kind: Kind, id: i64, owner: &user::Model) -> Result<i64> {
    let cost = self
      .registry
      .get(kind)?
      .cost(self.db, id, owner)
      .await?
      .ok_or(Error::RequestNotFound)?;
    cost.total()
  }

  /// `draft → new`, gated by the request's own cost.
  pub async fn submit(
    &self,
    kind: Kind,
    id: i64,
    actor: &user::Model,
  ) -> Result<Decision> {
    self.transition(kind, id, actor, Status::New).await
  }

  pub async fn transition(
    &self,
    kind: Kind,
    id: i64,
    actor: &user::Model,
    to: Status,
  ) -> Result<Decision> {
    let (_, owner) = self.resolve(kind, id, actor).await?;
    let _guard = self.locks.acquire(owner.id, self.mode).await;

    // re-read under the lock
    let header = request::header(self.db, kind, id)
      .await?
      .filter(|h| h.deleted_at.is_none())
      .ok_or(Error::RequestNotFound)?;
    let from = header.status;

    if !kind.can_transition(from, to) {
      return Err(Error::InvalidTransition { from, to });
    }

    match kind.accounting(from, to) {
      Accounting::Commit => {
        let cost = self.cost_of(kind, id, &owner).await?;
        if let Some(decision) = self.gate(actor, &owner, cost).await? {
          return Ok(decision);
        }
        self.swap(self.db, kind, id, from, to).await?;
      }
      Accounting::Settle => {
        let cost = self.cost_of(kind, id, &owner).await?;
        let txn = self.db.begin().await?;
        self.swap(&txn, kind, id, from, to).await?;
        if cost > 0 {
          let note = format!("{kind} request #{id} settled");
          sv::ledger::append(&txn, owner.id, EntryType::Debit, cost, Some(note))
            .await?;
        }
        txn.commit().await?;
        info!("Settled {} request #{} for user {}: {} points", kind, id, owner.id, cost);
      }
      Accounting::Release | Accounting::None => {
        self.swap(self.db, kind, id, from, to).await?;
      }
    }

    Ok(Decision::Applied { status: to })
  }

  /// Changes price or quantity. Counted requests are gated by the cost delta.
  pub async fn update_cost(
    &self,
    kind: Kind,
    id: i64,
    actor: &user::Model,
    update: CostUpdate,
  ) -> Result<Decision> {
    update.validate()?;

    let (_, owner) = self.resolve(kind, id, actor).await?;
    let _guard = self.locks.acquire(owner.id, self.mode).await;

    let header = request::header(self.db, kind, id)
      .await?
      .filter(|h| h.deleted_at.is_none())
      .ok_or(Error::RequestNotFound)?;
    if header.status.is_terminal() {
      return Err(Error::Validation(format!(
        "{kind} request #{id} is {} and can no longer be repriced",
        header.status
      )));
    }

    let projector = self.registry.get(kind)?;

    if kind.counts(header.status) {
      let old = projector
        .cost(self.db, id, &owner)
        .await?
        .ok_or(Error::RequestNotFound)?;
      let delta = sum_points([old.with(&update).total()?, -old.total()?])?;

      if let Some(decision) = self.gate(actor, &owner, delta).await? {
        return Ok(decision);
      }
    }

    projector.reprice(self.db, id, &update).await?;
    Ok(Decision::Applied { status: header.status })
  }

  async fn swap<C: ConnectionTrait>(
    &self,
    conn: &C,
    kind: Kind,
    id: i64,
    from: Status,
    to: Status,
  ) -> Result<()> {
    let moved = request::set_status(conn, kind, vec![id], &[from], to, None).await?;
    if moved == 0 {
      return Err(Error::Conflict);
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    entity::{Role, UserType},
    sv::Ledger,
    testing,
  };

  struct Fixture {
    db: DatabaseConnection,
    registry: Registry,
    locks: UserLocks,
  }

  impl Fixture {
    async fn new() -> Self {
      Self {
        db: testing::setup_test_db().await,
        registry: Registry::standard(),
        locks: UserLocks::new(),
      }
    }

    fn lifecycle(&self) -> Lifecycle<'_> {
      self.lifecycle_in(GateMode::Serialized)
    }

    fn lifecycle_in(&self, mode: GateMode) -> Lifecycle<'_> {
      let gate = Gate::new(&self.db, &self.registry, Duration::from_secs(5));
      Lifecycle::new(&self.db, &self.registry, gate, &self.locks, mode)
    }

    async fn funded(&self, user_type: UserType, points: i64) -> user::Model {
      let user = testing::user(&self.db, user_type, 30).await;
      Ledger::new(&self.db).credit(user.id, points, None).await.unwrap();
      user
    }
  }

  #[tokio::test]
  async fn test_submit_within_balance() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Normal, 100).await;
    testing::entity_request(&fx.db, user.id, Status::New, 10, 5).await;
    let draft = testing::entity_request(&fx.db, user.id, Status::Draft, 10, 4).await;

    let decision = fx.lifecycle().submit(Kind::Entity, draft.id, &user).await.unwrap();

    assert_eq!(decision, Decision::Applied { status: Status::New });
    let head = request::header(&fx.db, Kind::Entity, draft.id).await.unwrap().unwrap();
    assert_eq!(head.status, Status::New);
  }

  #[tokio::test]
  async fn test_submit_over_balance_is_rejected() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Normal, 100).await;
    testing::entity_request(&fx.db, user.id, Status::New, 10, 5).await;
    let draft = testing::entity_request(&fx.db, user.id, Status::Draft, 10, 6).await;

    let decision = fx.lifecycle().submit(Kind::Entity, draft.id, &user).await.unwrap();

    assert_eq!(decision, Decision::Insufficient { needed_points: 10 });
    let head = request::header(&fx.db, Kind::Entity, draft.id).await.unwrap().unwrap();
    assert_eq!(head.status, Status::Draft);
  }

  #[tokio::test]
  async fn test_expired_user_cannot_submit() {
    let fx = Fixture::new().await;
    let user = testing::user(&fx.db, UserType::Normal, -1).await;
    Ledger::new(&fx.db).credit(user.id, 1000, None).await.unwrap();
    let draft = testing::podcast_request(&fx.db, user.id, Status::Draft, 1, 1).await;

    let decision = fx.lifecycle().submit(Kind::Podcast, draft.id, &user).await.unwrap();

    assert_eq!(decision, Decision::Expired);
  }

  #[tokio::test]
  async fn test_banned_owner_is_ineligible() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Normal, 100).await;
    sv::User::new(&fx.db).set_banned(user.id, true).await.unwrap();
    let user = sv::User::new(&fx.db).get(user.id).await.unwrap();
    let draft = testing::podcast_request(&fx.db, user.id, Status::Draft, 1, 1).await;

    assert!(matches!(
      fx.lifecycle().submit(Kind::Podcast, draft.id, &user).await,
      Err(Error::UserIneligible)
    ));
  }

  #[tokio::test]
  async fn test_admin_charges_request_owner() {
    let fx = Fixture::new().await;
    let admin = testing::staff(&fx.db, Role::Admin).await;
    Ledger::new(&fx.db).credit(admin.id, 1_000_000, None).await.unwrap();
    let owner = fx.funded(UserType::Normal, 10).await;
    let draft = testing::podcast_request(&fx.db, owner.id, Status::Draft, 5, 3).await;

    let decision = fx.lifecycle().submit(Kind::Podcast, draft.id, &admin).await.unwrap();

    // the admin's own balance is irrelevant
    assert_eq!(decision, Decision::Insufficient { needed_points: 5 });
  }

  #[tokio::test]
  async fn test_other_users_request_is_forbidden() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Normal, 100).await;
    let owner = fx.funded(UserType::Normal, 100).await;
    let draft = testing::podcast_request(&fx.db, owner.id, Status::Draft, 1, 1).await;

    assert!(matches!(
      fx.lifecycle().submit(Kind::Podcast, draft.id, &user).await,
      Err(Error::Forbidden)
    ));
  }

  #[tokio::test]
  async fn test_priority_user_bypasses_own_gate() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Priority, 0).await;
    let draft = testing::podcast_request(&fx.db, user.id, Status::Draft, 5, 3).await;

    let decision = fx.lifecycle().submit(Kind::Podcast, draft.id, &user).await.unwrap();

    assert_eq!(decision, Decision::Applied { status: Status::New });
  }

  #[tokio::test]
  async fn test_invalid_transition() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Normal, 100).await;
    let draft = testing::entity_request(&fx.db, user.id, Status::Draft, 1, 1).await;

    assert!(matches!(
      fx.lifecycle()
        .transition(Kind::Entity, draft.id, &user, Status::Completed)
        .await,
      Err(Error::InvalidTransition { from: Status::Draft, to: Status::Completed })
    ));
  }

  #[tokio::test]
  async fn test_settlement_moves_usage_into_ledger() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Normal, 100).await;
    let running =
      testing::entity_request(&fx.db, user.id, Status::Running, 10, 5).await;
    let gate = Gate::new(&fx.db, &fx.registry, Duration::from_secs(5));

    let before = gate.check(&user, 0).await.unwrap();
    fx.lifecycle()
      .transition(Kind::Entity, running.id, &user, Status::Completed)
      .await
      .unwrap();
    let after = gate.check(&user, 0).await.unwrap();

    // available points unchanged: outstanding 50 became a debit of 50
    assert_eq!(before.total_points, 100);
    assert_eq!(after.total_points, 50);
    assert_eq!(before.needed_points, after.needed_points);
    assert_eq!(gate.usage(&user).await.unwrap().total().unwrap(), 0);
  }

  #[tokio::test]
  async fn test_index_settles_on_running() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Advanced, 100).await;
    let request = testing::index_request(&fx.db, user.id, Status::Pending).await;
    testing::index_links(&fx.db, request.id, 3).await;

    fx.lifecycle()
      .transition(Kind::Index, request.id, &user, Status::Running)
      .await
      .unwrap();

    assert_eq!(Ledger::new(&fx.db).balance(user.id).await.unwrap(), 94);
  }

  #[tokio::test]
  async fn test_cancel_releases_without_debit() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Normal, 100).await;
    let running =
      testing::entity_request(&fx.db, user.id, Status::Running, 10, 5).await;

    fx.lifecycle()
      .transition(Kind::Entity, running.id, &user, Status::Cancel)
      .await
      .unwrap();

    assert_eq!(Ledger::new(&fx.db).balance(user.id).await.unwrap(), 100);
  }

  #[tokio::test]
  async fn test_update_cost_gated_by_delta() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Normal, 100).await;
    let request = testing::entity_request(&fx.db, user.id, Status::New, 10, 5).await;
    let lifecycle = fx.lifecycle();

    // 10 × 10 = 100: delta 50 fits exactly
    let update = CostUpdate { unit_price: None, quantity: Some(10) };
    assert_eq!(
      lifecycle.update_cost(Kind::Entity, request.id, &user, update).await.unwrap(),
      Decision::Applied { status: Status::New }
    );

    // 11 × 10 = 110: delta 10 over
    let update = CostUpdate { unit_price: Some(11), quantity: None };
    assert_eq!(
      lifecycle.update_cost(Kind::Entity, request.id, &user, update).await.unwrap(),
      Decision::Insufficient { needed_points: 10 }
    );
  }

  #[tokio::test]
  async fn test_draft_reprice_is_not_gated() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Normal, 0).await;
    let draft = testing::podcast_request(&fx.db, user.id, Status::Draft, 1, 1).await;

    let update = CostUpdate { unit_price: Some(100), quantity: Some(100) };
    let decision = fx
      .lifecycle()
      .update_cost(Kind::Podcast, draft.id, &user, update)
      .await
      .unwrap();

    assert_eq!(decision, Decision::Applied { status: Status::Draft });
  }

  #[tokio::test]
  async fn test_finalized_request_cannot_be_repriced() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Normal, 100).await;
    let done =
      testing::podcast_request(&fx.db, user.id, Status::Completed, 1, 1).await;

    let update = CostUpdate { unit_price: Some(2), quantity: None };
    assert!(matches!(
      fx.lifecycle().update_cost(Kind::Podcast, done.id, &user, update).await,
      Err(Error::Validation(_))
    ));
  }

  #[tokio::test]
  async fn test_serialized_commits_do_not_double_spend() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Normal, 100).await;
    let first = testing::entity_request(&fx.db, user.id, Status::Draft, 10, 6).await;
    let second = testing::entity_request(&fx.db, user.id, Status::Draft, 10, 6).await;

    let lifecycle = fx.lifecycle();
    let (a, b) = tokio::join!(
      lifecycle.submit(Kind::Entity, first.id, &user),
      lifecycle.submit(Kind::Entity, second.id, &user),
    );

    let applied = [a.unwrap(), b.unwrap()]
      .into_iter()
      .filter(|d| matches!(d, Decision::Applied { .. }))
      .count();
    assert_eq!(applied, 1);
  }

  #[tokio::test]
  async fn test_check_mode_decides_without_lock() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Normal, 100).await;
    let first = testing::entity_request(&fx.db, user.id, Status::Draft, 10, 6).await;
    let second = testing::entity_request(&fx.db, user.id, Status::Draft, 10, 6).await;

    // a held serialized lock would block every locked commit of this user
    let held = fx.locks.acquire(user.id, GateMode::Serialized).await;

    let lifecycle = fx.lifecycle_in(GateMode::Check);
    let (a, b) = time::timeout(Duration::from_secs(5), async {
      tokio::join!(
        lifecycle.submit(Kind::Entity, first.id, &user),
        lifecycle.submit(Kind::Entity, second.id, &user),
      )
    })
    .await
    .expect("check mode must not wait for the user lock");
    drop(held);

    let decisions = [a.unwrap(), b.unwrap()];
    let applied = decisions
      .iter()
      .filter(|d| matches!(d, Decision::Applied { .. }))
      .count();
    assert!(applied >= 1);
    for decision in decisions {
      assert!(matches!(
        decision,
        Decision::Applied { status: Status::New } | Decision::Insufficient { .. }
      ));
    }

    // sequential commits are still gated
    let third = testing::entity_request(&fx.db, user.id, Status::Draft, 10, 6).await;
    assert!(matches!(
      lifecycle.submit(Kind::Entity, third.id, &user).await.unwrap(),
      Decision::Insufficient { .. }
    ));
  }

  #[tokio::test]
  async fn test_expired_post_paid_user_is_rejected() {
    let fx = Fixture::new().await;
    let user = testing::user(&fx.db, UserType::Priority, -10).await;
    let draft = testing::podcast_request(&fx.db, user.id, Status::Draft, 5, 3).await;

    let decision = fx.lifecycle().submit(Kind::Podcast, draft.id, &user).await.unwrap();

    assert_eq!(decision, Decision::Expired);
    let head = request::header(&fx.db, Kind::Podcast, draft.id).await.unwrap().unwrap();
    assert_eq!(head.status, Status::Draft);
  }

  #[tokio::test]
  async fn test_oversized_price_is_rejected() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Normal, 100).await;
    let request = testing::entity_request(&fx.db, user.id, Status::New, 10, 5).await;

    let update = CostUpdate { unit_price: Some(i64::MAX / 4), quantity: None };
    assert!(matches!(
      fx.lifecycle().update_cost(Kind::Entity, request.id, &user, update).await,
      Err(Error::Validation(_))
    ));

    let gate = Gate::new(&fx.db, &fx.registry, Duration::from_secs(5));
    assert!(!gate.check(&user, 1_000_000).await.unwrap().is_enough);
  }

  #[tokio::test]
  async fn test_request_deleted_while_waiting_is_not_found() {
    let fx = Fixture::new().await;
    let user = fx.funded(UserType::Normal, 100).await;
    let draft = testing::entity_request(&fx.db, user.id, Status::Draft, 1, 1).await;

    // the submit waits for the lock while the request is deleted
    let held = fx.locks.acquire(user.id, GateMode::Serialized).await;
    let lifecycle = fx.lifecycle();
    let (result, ()) = tokio::join!(
      lifecycle.submit(Kind::Entity, draft.id, &user),
      async {
        time::sleep(Duration::from_millis(50)).await;
        testing::soft_delete_entity(&fx.db, draft.id).await;
        drop(held);
      }
    );

    assert!(matches!(result, Err(Error::RequestNotFound)));
  }
}
