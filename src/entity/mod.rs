//! SeaORM entities for users, the points ledger and the six request kinds.
//!
//! Every request table shares `id`, `user_id`, `status` and `deleted_at`;
//! [`RequestEntity`] exposes those columns so bulk and lifecycle queries can be
//! written once for all kinds.

pub mod blog_link;
pub mod blog_request;
pub mod entity_request;
pub mod index_link;
pub mod index_request;
pub mod ledger_entry;
pub mod podcast_request;
pub mod social_link;
pub mod social_request;
pub mod stacking_link;
pub mod stacking_request;
pub mod user;

use std::fmt;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub use self::{
  blog_request::BlogKind,
  ledger_entry::EntryType,
  user::{Role, UserType},
};

/// Request status. Each [`Kind`] uses a subset, see [`Kind::statuses`].
#[derive(
  Clone,
  Copy,
  Debug,
  PartialEq,
  Eq,
  Hash,
  EnumIter,
  DeriveActiveEnum,
  Serialize,
  Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Status {
  #[sea_orm(string_value = "draft")]
  Draft,
  #[sea_orm(string_value = "new")]
  New,
  #[sea_orm(string_value = "pending")]
  Pending,
  #[sea_orm(string_value = "connecting")]
  Connecting,
  #[sea_orm(string_value = "running")]
  Running,
  #[sea_orm(string_value = "completed")]
  Completed,
  #[sea_orm(string_value = "cancel")]
  Cancel,
}

impl Status {
  /// Statuses a request may be soft-deleted from.
  pub const DELETABLE: [Status; 3] =
    [Status::Draft, Status::Completed, Status::Cancel];

  pub fn is_terminal(self) -> bool {
    matches!(self, Status::Completed | Status::Cancel)
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_value())
  }
}

/// Status of a child link row.
#[derive(
  Clone,
  Copy,
  Debug,
  PartialEq,
  Eq,
  Hash,
  EnumIter,
  DeriveActiveEnum,
  Serialize,
  Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
  #[sea_orm(string_value = "pending")]
  Pending,
  #[sea_orm(string_value = "running")]
  Running,
  #[sea_orm(string_value = "completed")]
  Completed,
  #[sea_orm(string_value = "failed")]
  Failed,
}

impl LinkStatus {
  /// Links that count towards a request's quantity. Failed links are not billed.
  pub const BILLABLE: [LinkStatus; 3] =
    [LinkStatus::Pending, LinkStatus::Running, LinkStatus::Completed];
}

/// What a status change means for the points ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Accounting {
  /// Request starts counting as outstanding usage: gated.
  Commit,
  /// Request stops counting because the work was delivered: debit written.
  Settle,
  /// Request stops counting because it was cancelled.
  Release,
  None,
}

/// The six request kinds.
#[derive(
  Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
  Entity,
  Index,
  Social,
  Stacking,
  Blog,
  Podcast,
}

impl Kind {
  pub const ALL: [Kind; 6] = [
    Kind::Entity,
    Kind::Index,
    Kind::Social,
    Kind::Stacking,
    Kind::Blog,
    Kind::Podcast,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Kind::Entity => "entity",
      Kind::Index => "index",
      Kind::Social => "social",
      Kind::Stacking => "stacking",
      Kind::Blog => "blog",
      Kind::Podcast => "podcast",
    }
  }

  pub fn statuses(self) -> &'static [Status] {
    use Status::*;

    match self {
      Kind::Social => &[Draft, New, Connecting, Running, Completed, Cancel],
      _ => &[Draft, New, Pending, Running, Completed, Cancel],
    }
  }

  /// Statuses whose requests count as outstanding usage.
  ///
  /// Index requests stop counting once running: at that point they are handed
  /// to the indexer and invoiced.
  pub fn counted(self) -> &'static [Status] {
    use Status::*;

    match self {
      Kind::Index => &[New, Pending],
      Kind::Social => &[New, Connecting, Running],
      _ => &[New, Pending, Running],
    }
  }

  pub fn counts(self, status: Status) -> bool {
    self.counted().contains(&status)
  }

  pub fn can_transition(self, from: Status, to: Status) -> bool {
    use Status::*;

    if from == to || from.is_terminal() {
      return false;
    }
    if !self.statuses().contains(&from) || !self.statuses().contains(&to) {
      return false;
    }

    match from {
      Draft => matches!(to, New | Cancel),
      New => !matches!(to, Draft | Completed),
      Pending | Connecting => matches!(to, Running | Cancel),
      Running => matches!(to, Completed | Cancel),
      Completed | Cancel => false,
    }
  }

  pub fn accounting(self, from: Status, to: Status) -> Accounting {
    match (self.counts(from), self.counts(to)) {
      (false, true) => Accounting::Commit,
      (true, false) if to == Status::Cancel => Accounting::Release,
      (true, false) => Accounting::Settle,
      _ => Accounting::None,
    }
  }
}

impl fmt::Display for Kind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Columns shared by every request table.
pub trait RequestEntity: EntityTrait {
  const ID: Self::Column;
  const USER_ID: Self::Column;
  const STATUS: Self::Column;
  const DELETED_AT: Self::Column;
}
