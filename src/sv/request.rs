//! Status and soft-delete writes shared by all request tables.
//!
//! Every write is conditional on the current status, so repeating it is a
//! no-op and a concurrent change shows up as zero affected rows.

use sea_orm::sea_query::Expr;

use crate::{
  entity::{
    Kind, RequestEntity, Status, blog_request, entity_request, index_request,
    podcast_request, social_request, stacking_request,
  },
  prelude::*,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
  pub user_id: i64,
  pub status: Status,
  pub deleted_at: Option<DateTime>,
}

async fn header_of<E, C>(conn: &C, id: i64) -> Result<Option<Header>>
where
  E: RequestEntity,
  C: ConnectionTrait,
{
  let row: Option<(i64, Status, Option<DateTime>)> = E::find()
    .select_only()
    .column(E::USER_ID)
    .column(E::STATUS)
    .column(E::DELETED_AT)
    .filter(E::ID.eq(id))
    .into_tuple()
    .one(conn)
    .await?;

  Ok(row.map(|(user_id, status, deleted_at)| Header { user_id, status, deleted_at }))
}

pub async fn header<C: ConnectionTrait>(
  conn: &C,
  kind: Kind,
  id: i64,
) -> Result<Option<Header>> {
  match kind {
    Kind::Entity => header_of::<entity_request::Entity, _>(conn, id).await,
    Kind::Index => header_of::<index_request::Entity, _>(conn, id).await,
    Kind::Social => header_of::<social_request::Entity, _>(conn, id).await,
    Kind::Stacking => header_of::<stacking_request::Entity, _>(conn, id).await,
    Kind::Blog => header_of::<blog_request::Entity, _>(conn, id).await,
    Kind::Podcast => header_of::<podcast_request::Entity, _>(conn, id).await,
  }
}

async fn set_status_of<E, C>(
  conn: &C,
  ids: Vec<i64>,
  from: &[Status],
  to: Status,
  owner: Option<i64>,
) -> Result<u64>
where
  E: RequestEntity,
  C: ConnectionTrait,
{
  let mut update = E::update_many()
    .col_expr(E::STATUS, Expr::value(to))
    .filter(E::ID.is_in(ids))
    .filter(E::DELETED_AT.is_null())
    .filter(E::STATUS.is_in(from.to_vec()));

  if let Some(owner) = owner {
    update = update.filter(E::USER_ID.eq(owner));
  }

  Ok(update.exec(conn).await?.rows_affected)
}

/// Moves the given requests to `to` if they are currently in one of `from`.
pub async fn set_status<C: ConnectionTrait>(
  conn: &C,
  kind: Kind,
  ids: Vec<i64>,
  from: &[Status],
  to: Status,
  owner: Option<i64>,
) -> Result<u64> {
  match kind {
    Kind::Entity => {
      set_status_of::<entity_request::Entity, _>(conn, ids, from, to, owner)
        .await
    }
    Kind::Index => {
      set_status_of::<index_request::Entity, _>(conn, ids, from, to, owner).await
    }
    Kind::Social => {
      set_status_of::<social_request::Entity, _>(conn, ids, from, to, owner)
        .await
    }
    Kind::Stacking => {
      set_status_of::<stacking_request::Entity, _>(conn, ids, from, to, owner)
        .await
    }
    Kind::Blog => {
      set_status_of::<blog_request::Entity, _>(conn, ids, from, to, owner).await
    }
    Kind::Podcast => {
      set_status_of::<podcast_request::Entity, _>(conn, ids, from, to, owner)
        .await
    }
  }
}

async fn soft_delete_of<E, C>(
  conn: &C,
  ids: Vec<i64>,
  owner: Option<i64>,
  now: DateTime,
) -> Result<u64>
where
  E: RequestEntity,
  C: ConnectionTrait,
{
  let mut update = E::update_many()
    .col_expr(E::DELETED_AT, Expr::value(now))
    .filter(E::ID.is_in(ids))
    .filter(E::DELETED_AT.is_null())
    .filter(E::STATUS.is_in(Status::DELETABLE));

  if let Some(owner) = owner {
    update = update.filter(E::USER_ID.eq(owner));
  }

  Ok(update.exec(conn).await?.rows_affected)
}

/// Soft-deletes the given requests that are in a deletable status.
pub async fn soft_delete<C: ConnectionTrait>(
  conn: &C,
  kind: Kind,
  ids: Vec<i64>,
  owner: Option<i64>,
) -> Result<u64> {
  let now = Utc::now().naive_utc();

  match kind {
    Kind::Entity => {
      soft_delete_of::<entity_request::Entity, _>(conn, ids, owner, now).await
    }
    Kind::Index => {
      soft_delete_of::<index_request::Entity, _>(conn, ids, owner, now).await
    }
    Kind::Social => {
      soft_delete_of::<social_request::Entity, _>(conn, ids, owner, now).await
    }
    Kind::Stacking => {
      soft_delete_of::<stacking_request::Entity, _>(conn, ids, owner, now).await
    }
    Kind::Blog => {
      soft_delete_of::<blog_request::Entity, _>(conn, ids, owner, now).await
    }
    Kind::Podcast => {
      soft_delete_of::<podcast_request::Entity, _>(conn, ids, owner, now).await
    }
  }
}
