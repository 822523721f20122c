use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::LinkStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "blog_links")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i64,
  pub request_id: i64,
  pub url: String,
  pub status: LinkStatus,
  pub deleted_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::blog_request::Entity",
    from = "Column::RequestId",
    to = "super::blog_request::Column::Id"
  )]
  Request,
}

impl Related<super::blog_request::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Request.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
