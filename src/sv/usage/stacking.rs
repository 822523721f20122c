use sea_orm::sea_query::Expr;

use super::{Cost, CostUpdate, UsageProjector, price_only};
use crate::{
  entity::{Kind, LinkStatus, stacking_link, stacking_request, user},
  prelude::*,
};

/// Google-Drive stacking: billable links at the request's `auction_price`.
pub struct StackingUsage;

#[async_trait]
impl UsageProjector for StackingUsage {
  fn kind(&self) -> Kind {
    Kind::Stacking
  }

  async fn outstanding(
    &self,
    db: &DatabaseConnection,
    user: &user::Model,
  ) -> Result<i64> {
    let total: Option<i64> = stacking_link::Entity::find()
      .inner_join(stacking_request::Entity)
      .select_only()
      .column_as(
        Expr::col((
          stacking_request::Entity,
          stacking_request::Column::AuctionPrice,
        ))
        .sum(),
        "total",
      )
      .filter(stacking_request::Column::UserId.eq(user.id))
      .filter(stacking_request::Column::DeletedAt.is_null())
      .filter(
        stacking_request::Column::Status
          .is_in(Kind::Stacking.counted().to_vec()),
      )
      .filter(stacking_link::Column::DeletedAt.is_null())
      .filter(stacking_link::Column::Status.is_in(LinkStatus::BILLABLE))
      .into_tuple()
      .one(db)
      .await?
      .flatten();

    Ok(total.unwrap_or(0))
  }

  async fn cost(
    &self,
    db: &DatabaseConnection,
    id: i64,
    _owner: &user::Model,
  ) -> Result<Option<Cost>> {
    let Some(request) = stacking_request::Entity::find_by_id(id).one(db).await?
    else {
      return Ok(None);
    };

    let links = stacking_link::Entity::find()
      .filter(stacking_link::Column::RequestId.eq(id))
      .filter(stacking_link::Column::DeletedAt.is_null())
      .filter(stacking_link::Column::Status.is_in(LinkStatus::BILLABLE))
      .count(db)
      .await?;

    Ok(Some(Cost::new(request.auction_price, links as i64)))
  }

  async fn reprice(
    &self,
    db: &DatabaseConnection,
    id: i64,
    update: &CostUpdate,
  ) -> Result<()> {
    let price = price_only(Kind::Stacking, update)?;

    let request = stacking_request::Entity::find_by_id(id)
      .one(db)
      .await?
      .ok_or(Error::RequestNotFound)?;

    stacking_request::ActiveModel {
      auction_price: Set(price),
      ..request.into()
    }
    .update(db)
    .await?;

    Ok(())
  }
}
