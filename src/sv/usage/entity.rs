use super::{Cost, CostUpdate, UsageProjector, points, sum_points};
use crate::{
  entity::{Kind, entity_request, user},
  prelude::*,
};

/// `auction_price × entity_limit`, no child rows involved.
pub struct EntityUsage;

#[async_trait]
impl UsageProjector for EntityUsage {
  fn kind(&self) -> Kind {
    Kind::Entity
  }

  async fn outstanding(
    &self,
    db: &DatabaseConnection,
    user: &user::Model,
  ) -> Result<i64> {
    let rows: Vec<(i64, i64)> = entity_request::Entity::find()
      .select_only()
      .column(entity_request::Column::AuctionPrice)
      .column(entity_request::Column::EntityLimit)
      .filter(entity_request::Column::UserId.eq(user.id))
      .filter(entity_request::Column::DeletedAt.is_null())
      .filter(
        entity_request::Column::Status.is_in(Kind::Entity.counted().to_vec()),
      )
      .into_tuple()
      .all(db)
      .await?;

    let costs = rows
      .into_iter()
      .map(|(price, limit)| points(price, limit))
      .collect::<Result<Vec<_>>>()?;
    sum_points(costs)
  }

  async fn cost(
    &self,
    db: &DatabaseConnection,
    id: i64,
    _owner: &user::Model,
  ) -> Result<Option<Cost>> {
    let request = entity_request::Entity::find_by_id(id).one(db).await?;
    Ok(request.map(|r| Cost::new(r.auction_price, r.entity_limit)))
  }

  async fn reprice(
    &self,
    db: &DatabaseConnection,
    id: i64,
    update: &CostUpdate,
  ) -> Result<()> {
    let request = entity_request::Entity::find_by_id(id)
      .one(db)
      .await?
      .ok_or(Error::RequestNotFound)?;

    let mut model: entity_request::ActiveModel = request.into();
    if let Some(price) = update.unit_price {
      model.auction_price = Set(price);
    }
    if let Some(limit) = update.quantity {
      model.entity_limit = Set(limit);
    }
    model.update(db).await?;

    Ok(())
  }
}
