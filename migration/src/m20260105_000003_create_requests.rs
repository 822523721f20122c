use sea_orm_migration::prelude::*;

use super::m20260105_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Columns every request table shares.
#[derive(DeriveIden, Clone, Copy)]
pub enum Request {
  Id,
  UserId,
  Status,
  AuctionPrice,
  CreatedAt,
  DeletedAt,
}

fn request_table<T>(table: T, name: &str, priced: bool) -> TableCreateStatement
where
  T: IntoIden + Copy + 'static,
{
  let mut stmt = Table::create();
  stmt
    .table(table)
    .if_not_exists()
    .col(
      ColumnDef::new(Request::Id)
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key(),
    )
    .col(ColumnDef::new(Request::UserId).big_integer().not_null())
    .col(ColumnDef::new(Request::Status).string().not_null().default("draft"))
    .col(ColumnDef::new(Request::CreatedAt).date_time().not_null())
    .col(ColumnDef::new(Request::DeletedAt).date_time().null())
    .foreign_key(
      ForeignKey::create()
        .name(format!("fk_{name}_user"))
        .from(table, Request::UserId)
        .to(Users::Table, Users::Id)
        .on_delete(ForeignKeyAction::Cascade),
    );

  if priced {
    stmt.col(
      ColumnDef::new(Request::AuctionPrice)
        .big_integer()
        .not_null()
        .default(0),
    );
  }

  stmt.to_owned()
}

fn owner_index<T>(table: T, name: &str) -> IndexCreateStatement
where
  T: IntoIden + 'static,
{
  Index::create()
    .name(format!("idx_{name}_owner"))
    .table(table)
    .col(Request::UserId)
    .col(Request::Status)
    .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    let mut entity = request_table(EntityRequests::Table, "entity_requests", true);
    entity.col(ColumnDef::new(EntityRequests::Name).string().not_null()).col(
      ColumnDef::new(EntityRequests::EntityLimit)
        .big_integer()
        .not_null()
        .default(0),
    );

    let mut index = request_table(IndexRequests::Table, "index_requests", false);
    index.col(ColumnDef::new(IndexRequests::Name).string().not_null());

    let mut social = request_table(SocialRequests::Table, "social_requests", true);
    social.col(ColumnDef::new(SocialRequests::Name).string().not_null());

    let mut stacking = request_table(
      GoogleStackingRequests::Table,
      "google_stacking_requests",
      true,
    );
    stacking
      .col(ColumnDef::new(GoogleStackingRequests::Name).string().not_null())
      .col(ColumnDef::new(GoogleStackingRequests::FolderUrl).string().null());

    let mut blog = request_table(BlogRequests::Table, "blog_requests", true);
    blog
      .col(ColumnDef::new(BlogRequests::Kind).string().not_null())
      .col(ColumnDef::new(BlogRequests::GroupId).big_integer().null());

    let mut podcast =
      request_table(PodcastRequests::Table, "podcast_requests", true);
    podcast
      .col(ColumnDef::new(PodcastRequests::Name).string().not_null())
      .col(
        ColumnDef::new(PodcastRequests::Target)
          .big_integer()
          .not_null()
          .default(0),
      );

    for stmt in [entity, index, social, stacking, blog, podcast] {
      manager.create_table(stmt).await?;
    }

    manager
      .create_index(owner_index(EntityRequests::Table, "entity_requests"))
      .await?;
    manager
      .create_index(owner_index(IndexRequests::Table, "index_requests"))
      .await?;
    manager
      .create_index(owner_index(SocialRequests::Table, "social_requests"))
      .await?;
    manager
      .create_index(owner_index(
        GoogleStackingRequests::Table,
        "google_stacking_requests",
      ))
      .await?;
    manager
      .create_index(owner_index(BlogRequests::Table, "blog_requests"))
      .await?;
    manager
      .create_index(owner_index(PodcastRequests::Table, "podcast_requests"))
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(PodcastRequests::Table).to_owned())
      .await?;
    manager
      .drop_table(Table::drop().table(BlogRequests::Table).to_owned())
      .await?;
    manager
      .drop_table(Table::drop().table(GoogleStackingRequests::Table).to_owned())
      .await?;
    manager
      .drop_table(Table::drop().table(SocialRequests::Table).to_owned())
      .await?;
    manager
      .drop_table(Table::drop().table(IndexRequests::Table).to_owned())
      .await?;
    manager
      .drop_table(Table::drop().table(EntityRequests::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden, Clone, Copy)]
pub enum EntityRequests {
  Table,
  Name,
  EntityLimit,
}

#[derive(DeriveIden, Clone, Copy)]
pub enum IndexRequests {
  Table,
  Name,
}

#[derive(DeriveIden, Clone, Copy)]
pub enum SocialRequests {
  Table,
  Name,
}

#[derive(DeriveIden, Clone, Copy)]
pub enum GoogleStackingRequests {
  Table,
  Name,
  FolderUrl,
}

#[derive(DeriveIden, Clone, Copy)]
pub enum BlogRequests {
  Table,
  Kind,
  GroupId,
}

#[derive(DeriveIden, Clone, Copy)]
pub enum PodcastRequests {
  Table,
  Name,
  Target,
}
