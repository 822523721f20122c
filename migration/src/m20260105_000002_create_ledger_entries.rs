use sea_orm_migration::prelude::*;

use super::m20260105_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(LedgerEntries::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(LedgerEntries::Id)
              .big_integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(LedgerEntries::UserId).big_integer().not_null())
          .col(ColumnDef::new(LedgerEntries::EntryType).string().not_null())
          .col(ColumnDef::new(LedgerEntries::Points).big_integer().not_null())
          .col(ColumnDef::new(LedgerEntries::Note).string().null())
          .col(ColumnDef::new(LedgerEntries::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_ledger_entries_user")
              .from(LedgerEntries::Table, LedgerEntries::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_ledger_entries_user")
          .table(LedgerEntries::Table)
          .col(LedgerEntries::UserId)
          .col(LedgerEntries::EntryType)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
enum LedgerEntries {
  Table,
  Id,
  UserId,
  EntryType,
  Points,
  Note,
  CreatedAt,
}
