//! Entity registration request. Quantity is the static `entity_limit`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{RequestEntity, Status};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "entity_requests")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i64,
  pub user_id: i64,
  pub name: String,
  pub status: Status,
  pub auction_price: i64,
  pub entity_limit: i64,
  pub created_at: DateTime,
  pub deleted_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl RequestEntity for Entity {
  const ID: Column = Column::Id;
  const USER_ID: Column = Column::UserId;
  const STATUS: Column = Column::Status;
  const DELETED_AT: Column = Column::DeletedAt;
}
