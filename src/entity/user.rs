use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account tier. Drives the per-link multiplier of index requests.
#[derive(
  Clone,
  Copy,
  Debug,
  Default,
  PartialEq,
  Eq,
  EnumIter,
  DeriveActiveEnum,
  Serialize,
  Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum UserType {
  #[default]
  #[sea_orm(string_value = "normal")]
  Normal,
  #[sea_orm(string_value = "advanced")]
  Advanced,
  #[sea_orm(string_value = "priority")]
  Priority,
}

impl UserType {
  pub fn multiplier(self) -> i64 {
    match self {
      UserType::Normal => 1,
      UserType::Advanced => 2,
      UserType::Priority => 3,
    }
  }
}

#[derive(
  Clone,
  Copy,
  Debug,
  Default,
  PartialEq,
  Eq,
  EnumIter,
  DeriveActiveEnum,
  Serialize,
  Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Role {
  #[default]
  #[sea_orm(string_value = "user")]
  User,
  #[sea_orm(string_value = "admin")]
  Admin,
  #[sea_orm(string_value = "dev")]
  Dev,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i64,
  pub name: String,
  pub user_type: UserType,
  pub role: Role,
  /// End of the window in which the user may spend points
  pub expires_at: DateTime,
  pub is_banned: bool,
  pub created_at: DateTime,
  pub deleted_at: Option<DateTime>,
}

impl Model {
  pub fn is_staff(&self) -> bool {
    matches!(self.role, Role::Admin | Role::Dev)
  }

  pub fn is_eligible(&self) -> bool {
    !self.is_banned && self.deleted_at.is_none()
  }

  pub fn is_expired(&self, now: DateTime) -> bool {
    self.expires_at < now
  }

  /// Staff and priority accounts are post-paid for their own requests.
  pub fn bypasses_gate(&self) -> bool {
    self.is_staff() || self.user_type == UserType::Priority
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "super::ledger_entry::Entity")]
  LedgerEntries,
}

impl Related<super::ledger_entry::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::LedgerEntries.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
