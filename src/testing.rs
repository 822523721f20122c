//! Fixtures shared by the unit tests.

use sea_orm::{DbBackend, EntityName, Schema};

use crate::{
  entity::{
    BlogKind, LinkStatus, Role, Status, UserType, blog_link, blog_request,
    entity_request, index_link, index_request, ledger_entry, podcast_request,
    social_link, social_request, stacking_link, stacking_request, user,
  },
  prelude::*,
};

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) {
  let schema = Schema::new(DbBackend::Sqlite);
  let stmt = schema.create_table_from_entity(entity);
  db.execute(db.get_database_backend().build(&stmt))
    .await
    .unwrap_or_else(|err| panic!("create {}: {err}", entity.table_name()));
}

pub async fn setup_test_db() -> DatabaseConnection {
  let db = Database::connect("sqlite::memory:").await.unwrap();

  create_table(&db, user::Entity).await;
  create_table(&db, ledger_entry::Entity).await;

  create_table(&db, entity_request::Entity).await;
  create_table(&db, index_request::Entity).await;
  create_table(&db, social_request::Entity).await;
  create_table(&db, stacking_request::Entity).await;
  create_table(&db, blog_request::Entity).await;
  create_table(&db, podcast_request::Entity).await;

  create_table(&db, index_link::Entity).await;
  create_table(&db, social_link::Entity).await;
  create_table(&db, stacking_link::Entity).await;
  create_table(&db, blog_link::Entity).await;

  db
}

fn now() -> DateTime {
  Utc::now().naive_utc()
}

/// A regular user whose window ends `days` from now. Negative means expired.
pub async fn user(
  db: &DatabaseConnection,
  user_type: UserType,
  days: i64,
) -> user::Model {
  user::ActiveModel {
    id: NotSet,
    name: Set(format!("{user_type:?}").to_lowercase()),
    user_type: Set(user_type),
    role: Set(Role::User),
    expires_at: Set(now() + TimeDelta::days(days)),
    is_banned: Set(false),
    created_at: Set(now()),
    deleted_at: Set(None),
  }
  .insert(db)
  .await
  .unwrap()
}

pub async fn staff(db: &DatabaseConnection, role: Role) -> user::Model {
  let user = user(db, UserType::Normal, 365).await;
  user::ActiveModel { role: Set(role), ..user.into() }.update(db).await.unwrap()
}

pub async fn entity_request(
  db: &DatabaseConnection,
  user_id: i64,
  status: Status,
  price: i64,
  limit: i64,
) -> entity_request::Model {
  entity_request::ActiveModel {
    id: NotSet,
    user_id: Set(user_id),
    name: Set("entity".into()),
    status: Set(status),
    auction_price: Set(price),
    entity_limit: Set(limit),
    created_at: Set(now()),
    deleted_at: Set(None),
  }
  .insert(db)
  .await
  .unwrap()
}

pub async fn soft_delete_entity(db: &DatabaseConnection, id: i64) {
  entity_request::Entity::update_many()
    .col_expr(
      entity_request::Column::DeletedAt,
      sea_orm::sea_query::Expr::value(now()),
    )
    .filter(entity_request::Column::Id.eq(id))
    .exec(db)
    .await
    .unwrap();
}

pub async fn index_request(
  db: &DatabaseConnection,
  user_id: i64,
  status: Status,
) -> index_request::Model {
  index_request::ActiveModel {
    id: NotSet,
    user_id: Set(user_id),
    name: Set("index".into()),
    status: Set(status),
    created_at: Set(now()),
    deleted_at: Set(None),
  }
  .insert(db)
  .await
  .unwrap()
}

pub async fn index_links(
  db: &DatabaseConnection,
  request_id: i64,
  n: usize,
) -> Vec<i64> {
  let mut ids = Vec::with_capacity(n);
  for i in 0..n {
    let link = index_link::ActiveModel {
      id: NotSet,
      request_id: Set(request_id),
      url: Set(format!("https://index.test/{request_id}/{i}")),
      status: Set(LinkStatus::Pending),
      deleted_at: Set(None),
    }
    .insert(db)
    .await
    .unwrap();
    ids.push(link.id);
  }
  ids
}

pub async fn fail_index_link(db: &DatabaseConnection, id: i64) {
  index_link::Entity::update_many()
    .col_expr(
      index_link::Column::Status,
      sea_orm::sea_query::Expr::value(LinkStatus::Failed),
    )
    .filter(index_link::Column::Id.eq(id))
    .exec(db)
    .await
    .unwrap();
}

pub async fn delete_index_link(db: &DatabaseConnection, id: i64) {
  index_link::Entity::update_many()
    .col_expr(index_link::Column::DeletedAt, sea_orm::sea_query::Expr::value(now()))
    .filter(index_link::Column::Id.eq(id))
    .exec(db)
    .await
    .unwrap();
}

pub async fn social_request(
  db: &DatabaseConnection,
  user_id: i64,
  status: Status,
  price: i64,
) -> social_request::Model {
  social_request::ActiveModel {
    id: NotSet,
    user_id: Set(user_id),
    name: Set("social".into()),
    status: Set(status),
    auction_price: Set(price),
    created_at: Set(now()),
    deleted_at: Set(None),
  }
  .insert(db)
  .await
  .unwrap()
}

pub async fn social_links(
  db: &DatabaseConnection,
  request_id: i64,
  n: usize,
) -> Vec<i64> {
  let mut ids = Vec::with_capacity(n);
  for i in 0..n {
    let link = social_link::ActiveModel {
      id: NotSet,
      request_id: Set(request_id),
      url: Set(format!("https://social.test/{request_id}/{i}")),
      status: Set(LinkStatus::Pending),
      deleted_at: Set(None),
    }
    .insert(db)
    .await
    .unwrap();
    ids.push(link.id);
  }
  ids
}

pub async fn stacking_request(
  db: &DatabaseConnection,
  user_id: i64,
  status: Status,
  price: i64,
) -> stacking_request::Model {
  stacking_request::ActiveModel {
    id: NotSet,
    user_id: Set(user_id),
    name: Set("stacking".into()),
    folder_url: Set(None),
    status: Set(status),
    auction_price: Set(price),
    created_at: Set(now()),
    deleted_at: Set(None),
  }
  .insert(db)
  .await
  .unwrap()
}

pub async fn stacking_links(
  db: &DatabaseConnection,
  request_id: i64,
  n: usize,
) -> Vec<i64> {
  let mut ids = Vec::with_capacity(n);
  for i in 0..n {
    let link = stacking_link::ActiveModel {
      id: NotSet,
      request_id: Set(request_id),
      url: Set(format!("https://docs.test/{request_id}/{i}")),
      status: Set(LinkStatus::Pending),
      deleted_at: Set(None),
    }
    .insert(db)
    .await
    .unwrap();
    ids.push(link.id);
  }
  ids
}

pub async fn delete_stacking_link(db: &DatabaseConnection, id: i64) {
  stacking_link::Entity::update_many()
    .col_expr(
      stacking_link::Column::DeletedAt,
      sea_orm::sea_query::Expr::value(now()),
    )
    .filter(stacking_link::Column::Id.eq(id))
    .exec(db)
    .await
    .unwrap();
}

pub async fn blog_request(
  db: &DatabaseConnection,
  user_id: i64,
  kind: BlogKind,
  group_id: Option<i64>,
  status: Status,
  price: i64,
) -> blog_request::Model {
  blog_request::ActiveModel {
    id: NotSet,
    user_id: Set(user_id),
    kind: Set(kind),
    group_id: Set(group_id),
    status: Set(status),
    auction_price: Set(price),
    created_at: Set(now()),
    deleted_at: Set(None),
  }
  .insert(db)
  .await
  .unwrap()
}

pub async fn blog_links(
  db: &DatabaseConnection,
  request_id: i64,
  urls: &[&str],
) -> Vec<i64> {
  let mut ids = Vec::with_capacity(urls.len());
  for url in urls {
    let link = blog_link::ActiveModel {
      id: NotSet,
      request_id: Set(request_id),
      url: Set(url.to_string()),
      status: Set(LinkStatus::Pending),
      deleted_at: Set(None),
    }
    .insert(db)
    .await
    .unwrap();
    ids.push(link.id);
  }
  ids
}

pub async fn podcast_request(
  db: &DatabaseConnection,
  user_id: i64,
  status: Status,
  price: i64,
  target: i64,
) -> podcast_request::Model {
  podcast_request::ActiveModel {
    id: NotSet,
    user_id: Set(user_id),
    name: Set("podcast".into()),
    status: Set(status),
    auction_price: Set(price),
    target: Set(target),
    created_at: Set(now()),
    deleted_at: Set(None),
  }
  .insert(db)
  .await
  .unwrap()
}
