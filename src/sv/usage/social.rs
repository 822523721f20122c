use sea_orm::sea_query::Expr;

use super::{Cost, CostUpdate, UsageProjector, price_only};
use crate::{
  entity::{Kind, LinkStatus, social_link, social_request, user},
  prelude::*,
};

/// Each billable link is charged at its request's `auction_price`.
pub struct SocialUsage;

#[async_trait]
impl UsageProjector for SocialUsage {
  fn kind(&self) -> Kind {
    Kind::Social
  }

  async fn outstanding(
    &self,
    db: &DatabaseConnection,
    user: &user::Model,
  ) -> Result<i64> {
    let total: Option<i64> = social_link::Entity::find()
      .inner_join(social_request::Entity)
      .select_only()
      .column_as(
        Expr::col((social_request::Entity, social_request::Column::AuctionPrice))
          .sum(),
        "total",
      )
      .filter(social_request::Column::UserId.eq(user.id))
      .filter(social_request::Column::DeletedAt.is_null())
      .filter(
        social_request::Column::Status.is_in(Kind::Social.counted().to_vec()),
      )
      .filter(social_link::Column::DeletedAt.is_null())
      .filter(social_link::Column::Status.is_in(LinkStatus::BILLABLE))
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
    let Some(request) = social_request::Entity::find_by_id(id).one(db).await?
    else {
      return Ok(None);
    };

    let links = social_link::Entity::find()
      .filter(social_link::Column::RequestId.eq(id))
      .filter(social_link::Column::DeletedAt.is_null())
      .filter(social_link::Column::Status.is_in(LinkStatus::BILLABLE))
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
    let price = price_only(Kind::Social, update)?;

    let request = social_request::Entity::find_by_id(id)
      .one(db)
      .await?
      .ok_or(Error::RequestNotFound)?;

    social_request::ActiveModel { auction_price: Set(price), ..request.into() }
      .update(db)
      .await?;

    Ok(())
  }
}
