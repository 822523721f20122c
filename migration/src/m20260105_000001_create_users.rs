use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Users::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Users::Id)
              .big_integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Users::Name).string().not_null())
          .col(
            ColumnDef::new(Users::UserType)
              .string()
              .not_null()
              .default("normal"),
          )
          .col(ColumnDef::new(Users::Role).string().not_null().default("user"))
          .col(ColumnDef::new(Users::ExpiresAt).date_time().not_null())
          .col(
            ColumnDef::new(Users::IsBanned)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(Users::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Users::DeletedAt).date_time().null())
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Users::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Users {
  Table,
  Id,
  Name,
  UserType,
  Role,
  ExpiresAt,
  IsBanned,
  CreatedAt,
  DeletedAt,
}
