use sea_orm::sea_query::Expr;

use crate::{
  entity::{EntryType, ledger_entry},
  prelude::*,
};

/// Points ledger. Balances are always summed from the entries, never cached.
pub struct Ledger<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Ledger<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// `Σcredit − Σdebit` over every entry of the user.
  pub async fn balance(&self, user_id: i64) -> Result<i64> {
    let totals: Vec<(EntryType, Option<i64>)> = ledger_entry::Entity::find()
      .select_only()
      .column(ledger_entry::Column::EntryType)
      .column_as(Expr::col(ledger_entry::Column::Points).sum(), "total")
      .filter(ledger_entry::Column::UserId.eq(user_id))
      .group_by(ledger_entry::Column::EntryType)
      .into_tuple()
      .all(self.db)
      .await?;

    Ok(totals.into_iter().fold(0, |balance, (ty, total)| match ty {
      EntryType::Credit => balance + total.unwrap_or(0),
      EntryType::Debit => balance - total.unwrap_or(0),
    }))
  }

  pub async fn credit(
    &self,
    user_id: i64,
    points: i64,
    note: Option<String>,
  ) -> Result<ledger_entry::Model> {
    append(self.db, user_id, EntryType::Credit, points, note).await
  }

  pub async fn debit(
    &self,
    user_id: i64,
    points: i64,
    note: Option<String>,
  ) -> Result<ledger_entry::Model> {
    append(self.db, user_id, EntryType::Debit, points, note).await
  }

  /// Newest entries first.
  pub async fn history(
    &self,
    user_id: i64,
    limit: u64,
  ) -> Result<Vec<ledger_entry::Model>> {
    let entries = ledger_entry::Entity::find()
      .filter(ledger_entry::Column::UserId.eq(user_id))
      .order_by_desc(ledger_entry::Column::Id)
      .limit(limit)
      .all(self.db)
      .await?;
    Ok(entries)
  }
}

/// Appends an entry on any connection, so settlement can write its debit in
/// the same transaction as the status change.
pub(crate) async fn append<C: ConnectionTrait>(
  conn: &C,
  user_id: i64,
  entry_type: EntryType,
  points: i64,
  note: Option<String>,
) -> Result<ledger_entry::Model> {
  if points < 0 {
    return Err(Error::Validation("points must not be negative".into()));
  }

  let entry = ledger_entry::ActiveModel {
    id: NotSet,
    user_id: Set(user_id),
    entry_type: Set(entry_type),
    points: Set(points),
    note: Set(note),
    created_at: Set(Utc::now().naive_utc()),
  };

  Ok(entry.insert(conn).await?)
}
