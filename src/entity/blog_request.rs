//! Blog request. `register` requests open blogs on every account of their
//! sibling group; `post` requests publish to their own links.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{RequestEntity, Status};

#[derive(
  Clone,
  Copy,
  Debug,
  PartialEq,
  Eq,
  EnumIter,
  DeriveActiveEnum,
  Serialize,
  Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum BlogKind {
  #[sea_orm(string_value = "register")]
  Register,
  #[sea_orm(string_value = "post")]
  Post,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "blog_requests")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i64,
  pub user_id: i64,
  pub kind: BlogKind,
  /// Register requests sharing a group register on the same accounts
  pub group_id: Option<i64>,
  pub status: Status,
  pub auction_price: i64,
  pub created_at: DateTime,
  pub deleted_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "super::blog_link::Entity")]
  Links,
}

impl Related<super::blog_link::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Links.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}

impl RequestEntity for Entity {
  const ID: Column = Column::Id;
  const USER_ID: Column = Column::UserId;
  const STATUS: Column = Column::Status;
  const DELETED_AT: Column = Column::DeletedAt;
}
