use sea_orm_migration::prelude::*;

use super::m20260105_000003_create_requests::{
  BlogRequests, GoogleStackingRequests, IndexRequests, Request, SocialRequests,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden, Clone, Copy)]
enum Link {
  Id,
  RequestId,
  Url,
  Status,
  DeletedAt,
}

fn link_table<T, P>(table: T, parent: P, name: &str) -> TableCreateStatement
where
  T: IntoIden + Copy + 'static,
  P: IntoIden + 'static,
{
  Table::create()
    .table(table)
    .if_not_exists()
    .col(
      ColumnDef::new(Link::Id)
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key(),
    )
    .col(ColumnDef::new(Link::RequestId).big_integer().not_null())
    .col(ColumnDef::new(Link::Url).string().not_null())
    .col(ColumnDef::new(Link::Status).string().not_null().default("pending"))
    .col(ColumnDef::new(Link::DeletedAt).date_time().null())
    .foreign_key(
      ForeignKey::create()
        .name(format!("fk_{name}_request"))
        .from(table, Link::RequestId)
        .to(parent, Request::Id)
        .on_delete(ForeignKeyAction::Cascade),
    )
    .to_owned()
}

fn request_index<T>(table: T, name: &str) -> IndexCreateStatement
where
  T: IntoIden + 'static,
{
  Index::create()
    .name(format!("idx_{name}_request"))
    .table(table)
    .col(Link::RequestId)
    .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    let tables = [
      (
        link_table(IndexLinks::Table, IndexRequests::Table, "index_links"),
        request_index(IndexLinks::Table, "index_links"),
      ),
      (
        link_table(SocialLinks::Table, SocialRequests::Table, "social_links"),
        request_index(SocialLinks::Table, "social_links"),
      ),
      (
        link_table(
          GoogleStackingLinks::Table,
          GoogleStackingRequests::Table,
          "google_stacking_links",
        ),
        request_index(GoogleStackingLinks::Table, "google_stacking_links"),
      ),
      (
        link_table(BlogLinks::Table, BlogRequests::Table, "blog_links"),
        request_index(BlogLinks::Table, "blog_links"),
      ),
    ];

    for (table, index) in tables {
      manager.create_table(table).await?;
      manager.create_index(index).await?;
    }

    Ok(())
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(BlogLinks::Table).to_owned())
      .await?;
    manager
      .drop_table(Table::drop().table(GoogleStackingLinks::Table).to_owned())
      .await?;
    manager
      .drop_table(Table::drop().table(SocialLinks::Table).to_owned())
      .await?;
    manager
      .drop_table(Table::drop().table(IndexLinks::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden, Clone, Copy)]
enum IndexLinks {
  Table,
}

#[derive(DeriveIden, Clone, Copy)]
enum SocialLinks {
  Table,
}

#[derive(DeriveIden, Clone, Copy)]
enum GoogleStackingLinks {
  Table,
}

#[derive(DeriveIden, Clone, Copy)]
enum BlogLinks {
  Table,
}
