//! Quota gate: decides whether a user can afford an incremental cost.
//!
//! The check is read-only. In [`GateMode::Serialized`] callers additionally
//! hold a per-user lock from [`UserLocks`] across check and write.

use std::str::FromStr;

use futures::future;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
  entity::{Kind, user},
  prelude::*,
  sv::{
    Ledger,
    usage::{Registry, sum_points},
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateCheck {
  pub is_expired: bool,
  pub is_enough: bool,
  pub total_points: i64,
  /// `|total_points − total_used|`. Only a shortfall when `!is_enough`.
  pub needed_points: i64,
}

impl GateCheck {
  pub fn expired() -> Self {
    Self { is_expired: true, is_enough: false, total_points: 0, needed_points: 0 }
  }

  /// Fails instead of wrapping when the difference leaves `i64`.
  pub fn evaluate(total_points: i64, total_used: i64) -> Result<Self> {
    let needed_points = total_points
      .checked_sub(total_used)
      .and_then(i64::checked_abs)
      .ok_or_else(|| Error::Validation("point amount out of range".into()))?;

    Ok(Self {
      is_expired: false,
      is_enough: total_points >= total_used,
      total_points,
      needed_points,
    })
  }

  pub fn shortfall(&self) -> Option<i64> {
    (!self.is_expired && !self.is_enough).then_some(self.needed_points)
  }
}

/// What callers outside the service see. The surplus half of `needed_points`
/// is dropped.
#[derive(Debug, Serialize)]
pub struct GateView {
  pub is_expired: bool,
  pub is_enough: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub needed_points: Option<i64>,
}

impl From<GateCheck> for GateView {
  fn from(check: GateCheck) -> Self {
    Self {
      is_expired: check.is_expired,
      is_enough: check.is_enough,
      needed_points: check.shortfall(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindUsage {
  pub kind: Kind,
  pub points: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Usage {
  pub kinds: Vec<KindUsage>,
}

impl Usage {
  pub fn total(&self) -> Result<i64> {
    sum_points(self.kinds.iter().map(|k| k.points))
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GateMode {
  /// Plain check-then-act. Concurrent commits for one user may both pass.
  Check,
  /// Check and write run under a per-user lock.
  #[default]
  Serialized,
}

impl FromStr for GateMode {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "check" => Ok(GateMode::Check),
      "serialized" => Ok(GateMode::Serialized),
      other => Err(Error::Validation(format!("unknown gate mode `{other}`"))),
    }
  }
}

/// Per-user async locks for [`GateMode::Serialized`].
#[derive(Default)]
pub struct UserLocks {
  locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl UserLocks {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn acquire(
    &self,
    user_id: i64,
    mode: GateMode,
  ) -> Option<OwnedMutexGuard<()>> {
    if mode == GateMode::Check {
      return None;
    }
    // clone out of the map before awaiting so no shard lock is held
    let lock = self.locks.entry(user_id).or_default().clone();
    Some(lock.lock_owned().await)
  }

  /// Drops locks nobody holds or waits for.
  pub fn gc(&self) {
    self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
  }

  pub fn len(&self) -> usize {
    self.locks.len()
  }
}

pub struct Gate<'a> {
  db: &'a DatabaseConnection,
  registry: &'a Registry,
  timeout: Duration,
}

impl<'a> Gate<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    registry: &'a Registry,
    timeout: Duration,
  ) -> Self {
    Self { db, registry, timeout }
  }

  pub async fn check(&self, user: &user::Model, cost: i64) -> Result<GateCheck> {
    if user.is_expired(Utc::now().naive_utc()) {
      debug!("Gate: user {} quota window expired", user.id);
      return Ok(GateCheck::expired());
    }

    let total_points = Ledger::new(self.db).balance(user.id).await?;
    let usage = self.usage(user).await?;

    let outstanding = usage.total()?;
    let total_used = sum_points([outstanding, cost])?;
    let check = GateCheck::evaluate(total_points, total_used)?;
    debug!(
      "Gate: user {} balance {} outstanding {} cost {} -> enough: {}",
      user.id,
      check.total_points,
      outstanding,
      cost,
      check.is_enough
    );
    Ok(check)
  }

  /// Outstanding usage of every registered kind. Fails if any projector fails
  /// or the fan-in does not finish in time.
  pub async fn usage(&self, user: &user::Model) -> Result<Usage> {
    let projections = self.registry.iter().map(|projector| async move {
      let kind = projector.kind();
      projector
        .outstanding(self.db, user)
        .await
        .map(|points| KindUsage { kind, points })
        .map_err(|err| Error::Projection { kind, reason: err.to_string() })
    });

    let kinds = time::timeout(self.timeout, future::try_join_all(projections))
      .await
      .map_err(|_| Error::ProjectionTimeout(self.timeout))?
      .inspect_err(|err| warn!("Gate: {}", err))?;

    Ok(Usage { kinds })
  }
}
