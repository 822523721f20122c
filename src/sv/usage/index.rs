use super::{Cost, CostUpdate, UsageProjector, points};
use crate::{
  entity::{Kind, LinkStatus, index_link, index_request, user},
  prelude::*,
};

/// Billable links × the owner's type multiplier.
///
/// Only requests that have not been handed to the indexer yet are counted;
/// see [`Kind::counted`].
pub struct IndexUsage;

#[async_trait]
impl UsageProjector for IndexUsage {
  fn kind(&self) -> Kind {
    Kind::Index
  }

  async fn outstanding(
    &self,
    db: &DatabaseConnection,
    user: &user::Model,
  ) -> Result<i64> {
    let links = index_link::Entity::find()
      .inner_join(index_request::Entity)
      .filter(index_request::Column::UserId.eq(user.id))
      .filter(index_request::Column::DeletedAt.is_null())
      .filter(index_request::Column::Status.is_in(Kind::Index.counted().to_vec()))
      .filter(index_link::Column::DeletedAt.is_null())
      .filter(index_link::Column::Status.is_in(LinkStatus::BILLABLE))
      .count(db)
      .await?;

    points(links as i64, user.user_type.multiplier())
  }

  async fn cost(
    &self,
    db: &DatabaseConnection,
    id: i64,
    owner: &user::Model,
  ) -> Result<Option<Cost>> {
    if index_request::Entity::find_by_id(id).one(db).await?.is_none() {
      return Ok(None);
    }

    let links = index_link::Entity::find()
      .filter(index_link::Column::RequestId.eq(id))
      .filter(index_link::Column::DeletedAt.is_null())
      .filter(index_link::Column::Status.is_in(LinkStatus::BILLABLE))
      .count(db)
      .await?;

    Ok(Some(Cost {
      unit_price: 1,
      quantity: links as i64,
      multiplier: owner.user_type.multiplier(),
    }))
  }

  async fn reprice(
    &self,
    _db: &DatabaseConnection,
    _id: i64,
    _update: &CostUpdate,
  ) -> Result<()> {
    Err(Error::Validation(
      "index requests are priced per link by account type".into(),
    ))
  }
}
