use super::{Cost, CostUpdate, UsageProjector, points, sum_points};
use crate::{
  entity::{Kind, podcast_request, user},
  prelude::*,
};

/// Weighted by the declared `target`, not by live child rows.
pub struct PodcastUsage;

#[async_trait]
impl UsageProjector for PodcastUsage {
  fn kind(&self) -> Kind {
    Kind::Podcast
  }

  async fn outstanding(
    &self,
    db: &DatabaseConnection,
    user: &user::Model,
  ) -> Result<i64> {
    let rows: Vec<(i64, i64)> = podcast_request::Entity::find()
      .select_only()
      .column(podcast_request::Column::AuctionPrice)
      .column(podcast_request::Column::Target)
      .filter(podcast_request::Column::UserId.eq(user.id))
      .filter(podcast_request::Column::DeletedAt.is_null())
      .filter(
        podcast_request::Column::Status.is_in(Kind::Podcast.counted().to_vec()),
      )
      .into_tuple()
      .all(db)
      .await?;

    let costs = rows
      .into_iter()
      .map(|(price, target)| points(price, target))
      .collect::<Result<Vec<_>>>()?;
    sum_points(costs)
  }

  async fn cost(
    &self,
    db: &DatabaseConnection,
    id: i64,
    _owner: &user::Model,
  ) -> Result<Option<Cost>> {
    let request = podcast_request::Entity::find_by_id(id).one(db).await?;
    Ok(request.map(|r| Cost::new(r.auction_price, r.target)))
  }

  async fn reprice(
    &self,
    db: &DatabaseConnection,
    id: i64,
    update: &CostUpdate,
  ) -> Result<()> {
    let request = podcast_request::Entity::find_by_id(id)
      .one(db)
      .await?
      .ok_or(Error::RequestNotFound)?;

    let mut model: podcast_request::ActiveModel = request.into();
    if let Some(price) = update.unit_price {
      model.auction_price = Set(price);
    }
    if let Some(target) = update.quantity {
      model.target = Set(target);
    }
    model.update(db).await?;

    Ok(())
  }
}
