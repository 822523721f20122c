use std::collections::HashSet;

use super::{
  Cost, CostUpdate, UsageProjector, normalize_url, points, price_only, sum_points,
};
use crate::{
  entity::{BlogKind, Kind, LinkStatus, blog_link, blog_request, user},
  prelude::*,
};

/// Blog requests branch on their sub-kind.
///
/// A `post` request is weighted by its own billable links. A `register`
/// request is weighted by the account count of its sibling group: the distinct
/// account URLs across its own links and the links of counted register
/// requests sharing its `group_id`.
pub struct BlogUsage;

impl BlogUsage {
  async fn counted_requests(
    db: &DatabaseConnection,
    user_id: i64,
  ) -> Result<Vec<blog_request::Model>> {
    let requests = blog_request::Entity::find()
      .filter(blog_request::Column::UserId.eq(user_id))
      .filter(blog_request::Column::DeletedAt.is_null())
      .filter(blog_request::Column::Status.is_in(Kind::Blog.counted().to_vec()))
      .all(db)
      .await?;
    Ok(requests)
  }

  async fn billable_links(
    db: &DatabaseConnection,
    request_ids: Vec<i64>,
  ) -> Result<HashMap<i64, Vec<String>>> {
    let mut by_request: HashMap<i64, Vec<String>> = HashMap::new();
    if request_ids.is_empty() {
      return Ok(by_request);
    }

    let links = blog_link::Entity::find()
      .filter(blog_link::Column::RequestId.is_in(request_ids))
      .filter(blog_link::Column::DeletedAt.is_null())
      .filter(blog_link::Column::Status.is_in(LinkStatus::BILLABLE))
      .all(db)
      .await?;

    for link in links {
      by_request.entry(link.request_id).or_default().push(link.url);
    }
    Ok(by_request)
  }
}

/// Distinct accounts of `request`'s sibling group. `siblings` may contain the
/// request itself.
fn group_accounts(
  request: &blog_request::Model,
  siblings: &[&blog_request::Model],
  links: &HashMap<i64, Vec<String>>,
) -> i64 {
  let urls = |id: i64| -> HashSet<String> {
    links.get(&id).into_iter().flatten().map(|url| normalize_url(url)).collect()
  };

  let own = urls(request.id);
  let mut group = HashSet::new();
  if request.group_id.is_some() {
    for sibling in siblings {
      if sibling.id != request.id
        && sibling.kind == BlogKind::Register
        && sibling.group_id == request.group_id
      {
        group.extend(urls(sibling.id));
      }
    }
  }

  own.union(&group).count() as i64
}

#[async_trait]
impl UsageProjector for BlogUsage {
  fn kind(&self) -> Kind {
    Kind::Blog
  }

  async fn outstanding(
    &self,
    db: &DatabaseConnection,
    user: &user::Model,
  ) -> Result<i64> {
    let requests = Self::counted_requests(db, user.id).await?;
    let links =
      Self::billable_links(db, requests.iter().map(|r| r.id).collect()).await?;
    let siblings: Vec<_> = requests.iter().collect();

    let costs = requests
      .iter()
      .map(|request| {
        let quantity = match request.kind {
          BlogKind::Post => links.get(&request.id).map_or(0, Vec::len) as i64,
          BlogKind::Register => group_accounts(request, &siblings, &links),
        };
        points(request.auction_price, quantity)
      })
      .collect::<Result<Vec<_>>>()?;

    sum_points(costs)
  }

  async fn cost(
    &self,
    db: &DatabaseConnection,
    id: i64,
    owner: &user::Model,
  ) -> Result<Option<Cost>> {
    let Some(request) = blog_request::Entity::find_by_id(id).one(db).await?
    else {
      return Ok(None);
    };

    let quantity = match request.kind {
      BlogKind::Post => {
        blog_link::Entity::find()
          .filter(blog_link::Column::RequestId.eq(id))
          .filter(blog_link::Column::DeletedAt.is_null())
          .filter(blog_link::Column::Status.is_in(LinkStatus::BILLABLE))
          .count(db)
          .await? as i64
      }
      BlogKind::Register => {
        let counted = match request.group_id {
          Some(_) => Self::counted_requests(db, owner.id).await?,
          None => Vec::new(),
        };
        let mut ids: Vec<i64> = counted.iter().map(|r| r.id).collect();
        ids.push(request.id);

        let links = Self::billable_links(db, ids).await?;
        let siblings: Vec<_> = counted.iter().collect();
        group_accounts(&request, &siblings, &links)
      }
    };

    Ok(Some(Cost::new(request.auction_price, quantity)))
  }

  async fn reprice(
    &self,
    db: &DatabaseConnection,
    id: i64,
    update: &CostUpdate,
  ) -> Result<()> {
    let price = price_only(Kind::Blog, update)?;

    let request = blog_request::Entity::find_by_id(id)
      .one(db)
      .await?
      .ok_or(Error::RequestNotFound)?;

    blog_request::ActiveModel { auction_price: Set(price), ..request.into() }
      .update(db)
      .await?;

    Ok(())
  }
}
