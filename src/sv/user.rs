use crate::{
  entity::{Role, UserType, user},
  prelude::*,
};

/// `base + days`, rejecting spans chrono cannot represent.
fn after_days(base: DateTime, days: u64) -> Result<DateTime> {
  i64::try_from(days)
    .ok()
    .and_then(TimeDelta::try_days)
    .and_then(|delta| base.checked_add_signed(delta))
    .ok_or_else(|| Error::Validation(format!("cannot extend by {days} days")))
}

pub struct User<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> User<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn create(
    &self,
    name: &str,
    user_type: UserType,
    role: Role,
    days: u64,
  ) -> Result<user::Model> {
    let now = Utc::now().naive_utc();
    let expires_at = after_days(now, days)?;
    let user = user::ActiveModel {
      id: NotSet,
      name: Set(name.to_string()),
      user_type: Set(user_type),
      role: Set(role),
      expires_at: Set(expires_at),
      is_banned: Set(false),
      created_at: Set(now),
      deleted_at: Set(None),
    };

    Ok(user.insert(self.db).await?)
  }

  pub async fn by_id(&self, id: i64) -> Result<Option<user::Model>> {
    Ok(user::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn get(&self, id: i64) -> Result<user::Model> {
    self.by_id(id).await?.ok_or(Error::UserNotFound)
  }

  /// Extends the quota window. An already expired window restarts from now.
  pub async fn extend(&self, id: i64, days: u64) -> Result<DateTime> {
    let txn = self.db.begin().await?;

    let user =
      user::Entity::find_by_id(id).one(&txn).await?.ok_or(Error::UserNotFound)?;

    let now = Utc::now().naive_utc();
    let base = if user.expires_at < now { now } else { user.expires_at };
    let expires_at = after_days(base, days)?;

    user::ActiveModel { expires_at: Set(expires_at), ..user.into() }
      .update(&txn)
      .await?;

    txn.commit().await?;
    Ok(expires_at)
  }

  pub async fn set_banned(&self, id: i64, banned: bool) -> Result<()> {
    let user = self.get(id).await?;

    user::ActiveModel { is_banned: Set(banned), ..user.into() }
      .update(self.db)
      .await?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing;

  #[tokio::test]
  async fn test_extend_expired_user_restarts_window() {
    let db = testing::setup_test_db().await;
    let sv = User::new(&db);

    let user = testing::user(&db, UserType::Normal, -3).await;
    let expires_at = sv.extend(user.id, 10).await.unwrap();

    let now = Utc::now().naive_utc();
    assert!(expires_at > now + TimeDelta::days(9));
    assert!(expires_at <= now + TimeDelta::days(10));
  }

  #[tokio::test]
  async fn test_extend_active_user_adds_to_deadline() {
    let db = testing::setup_test_db().await;
    let sv = User::new(&db);

    let user = testing::user(&db, UserType::Normal, 5).await;
    let expires_at = sv.extend(user.id, 10).await.unwrap();

    assert_eq!(expires_at, user.expires_at + TimeDelta::days(10));
  }

  #[tokio::test]
  async fn test_extend_out_of_range_keeps_deadline() {
    let db = testing::setup_test_db().await;
    let sv = User::new(&db);

    let user = testing::user(&db, UserType::Normal, 5).await;
    for days in [u64::MAX, i64::MAX as u64] {
      assert!(matches!(sv.extend(user.id, days).await, Err(Error::Validation(_))));
    }
    assert_eq!(sv.get(user.id).await.unwrap().expires_at, user.expires_at);

    assert!(matches!(
      sv.create("bob", UserType::Normal, Role::User, u64::MAX).await,
      Err(Error::Validation(_))
    ));
  }

  #[tokio::test]
  async fn test_banned_user_is_not_eligible() {
    let db = testing::setup_test_db().await;
    let sv = User::new(&db);

    let user = testing::user(&db, UserType::Normal, 5).await;
    assert!(user.is_eligible());

    sv.set_banned(user.id, true).await.unwrap();
    assert!(!sv.get(user.id).await.unwrap().is_eligible());
  }

  #[tokio::test]
  async fn test_missing_user() {
    let db = testing::setup_test_db().await;

    assert!(matches!(User::new(&db).get(42).await, Err(Error::UserNotFound)));
  }
}
