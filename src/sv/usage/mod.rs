//! Outstanding usage, one projector per request kind.
//!
//! A projector answers two questions for its kind: how many points the user
//! has committed but not yet settled, and what a single request costs. The
//! gate only talks to the [`Registry`], so kinds can be swapped or added
//! without touching it.

mod blog;
mod entity;
mod index;
mod podcast;
mod social;
mod stacking;

use serde::{Deserialize, Serialize};

pub use self::{
  blog::BlogUsage, entity::EntityUsage, index::IndexUsage,
  podcast::PodcastUsage, social::SocialUsage, stacking::StackingUsage,
};
use crate::{
  entity::{Kind, user},
  prelude::*,
};

pub const MAX_UNIT_PRICE: i64 = 1_000_000_000;
pub const MAX_QUANTITY: i64 = 1_000_000;

fn checked(points: Option<i64>) -> Result<i64> {
  points.ok_or_else(|| Error::Validation("point amount out of range".into()))
}

/// `price × quantity`, failing instead of wrapping.
pub fn points(price: i64, quantity: i64) -> Result<i64> {
  checked(price.checked_mul(quantity))
}

/// Sum of point amounts, failing instead of wrapping.
pub fn sum_points(amounts: impl IntoIterator<Item = i64>) -> Result<i64> {
  amounts
    .into_iter()
    .try_fold(0i64, |total, amount| checked(total.checked_add(amount)))
}

/// Committed cost of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cost {
  pub unit_price: i64,
  pub quantity: i64,
  pub multiplier: i64,
}

impl Cost {
  pub fn new(unit_price: i64, quantity: i64) -> Self {
    Self { unit_price, quantity, multiplier: 1 }
  }

  pub fn total(&self) -> Result<i64> {
    points(self.unit_price, self.quantity)
      .and_then(|points| checked(points.checked_mul(self.multiplier)))
  }

  pub fn with(&self, update: &CostUpdate) -> Self {
    Self {
      unit_price: update.unit_price.unwrap_or(self.unit_price),
      quantity: update.quantity.unwrap_or(self.quantity),
      multiplier: self.multiplier,
    }
  }
}

/// Requested change of a request's cost-bearing fields.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CostUpdate {
  pub unit_price: Option<i64>,
  pub quantity: Option<i64>,
}

impl CostUpdate {
  pub fn validate(&self) -> Result<()> {
    if self.unit_price.is_none() && self.quantity.is_none() {
      return Err(Error::Validation("nothing to update".into()));
    }
    if self.unit_price.is_some_and(|p| p < 0) || self.quantity.is_some_and(|q| q < 0)
    {
      return Err(Error::Validation("cost fields must not be negative".into()));
    }
    if self.unit_price.is_some_and(|p| p > MAX_UNIT_PRICE)
      || self.quantity.is_some_and(|q| q > MAX_QUANTITY)
    {
      return Err(Error::Validation(format!(
        "unit price is capped at {MAX_UNIT_PRICE} and quantity at {MAX_QUANTITY}"
      )));
    }
    Ok(())
  }
}

#[async_trait]
pub trait UsageProjector: Send + Sync {
  fn kind(&self) -> Kind;

  /// Points committed by the user's counted, non-deleted requests of this kind.
  async fn outstanding(
    &self,
    db: &DatabaseConnection,
    user: &user::Model,
  ) -> Result<i64>;

  /// Cost of a single request as if it were counted. `owner` is the user the
  /// request is charged to.
  async fn cost(
    &self,
    db: &DatabaseConnection,
    id: i64,
    owner: &user::Model,
  ) -> Result<Option<Cost>>;

  /// Writes the cost-bearing fields this kind stores on the request.
  async fn reprice(
    &self,
    db: &DatabaseConnection,
    id: i64,
    update: &CostUpdate,
  ) -> Result<()>;
}

/// Projectors keyed by kind. Registering a kind twice replaces the first.
#[derive(Clone, Default)]
pub struct Registry {
  projectors: Vec<Arc<dyn UsageProjector>>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// All six kinds with their standard formulas.
  pub fn standard() -> Self {
    let registry = Self::new()
      .register(EntityUsage)
      .register(IndexUsage)
      .register(SocialUsage)
      .register(StackingUsage)
      .register(BlogUsage)
      .register(PodcastUsage);
    debug_assert!(Kind::ALL.iter().all(|&kind| registry.get(kind).is_ok()));
    registry
  }

  pub fn register<P: UsageProjector + 'static>(mut self, projector: P) -> Self {
    let kind = projector.kind();
    self.projectors.retain(|p| p.kind() != kind);
    self.projectors.push(Arc::new(projector));
    self
  }

  pub fn get(&self, kind: Kind) -> Result<&dyn UsageProjector> {
    self
      .projectors
      .iter()
      .find(|p| p.kind() == kind)
      .map(|p| p.as_ref())
      .ok_or_else(|| {
        Error::Internal(format!("no usage projector registered for {kind}"))
      })
  }

  pub fn iter(&self) -> impl Iterator<Item = &dyn UsageProjector> {
    self.projectors.iter().map(|p| p.as_ref())
  }
}

/// Rejects quantity updates for kinds that derive quantity from child rows.
fn price_only(kind: Kind, update: &CostUpdate) -> Result<i64> {
  if update.quantity.is_some() {
    return Err(Error::Validation(format!(
      "{kind} quantity is derived from its links"
    )));
  }
  update
    .unit_price
    .ok_or_else(|| Error::Validation("nothing to update".into()))
}

fn normalize_url(url: &str) -> String {
  url.trim().trim_end_matches('/').to_lowercase()
}
