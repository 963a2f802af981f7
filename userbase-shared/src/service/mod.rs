/// Business-facing facade over [`Repository`]
///
/// `Service<E>` forwards every repository operation unchanged. Handlers talk
/// to services only, so the storage layer can change underneath them.
/// Entity-specific helpers live in inherent impls below.

use futures::future::BoxFuture;
use sqlx::PgPool;

use crate::entity::{Activity, Entity, User, Value};
use crate::repository::{
    Direction, Filter, GroupCount, OrderBy, Page, Repository, Result,
};

/// Service for entity `E`
pub struct Service<E> {
    repo: Repository<E>,
}

impl<E> Clone for Service<E> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

impl<E> std::fmt::Debug for Service<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service").field("repo", &self.repo).finish()
    }
}

impl<E> Service<E> {
    pub fn new(repo: Repository<E>) -> Self {
        Self { repo }
    }

    /// Service backed by a pool-bound repository
    pub fn from_pool(pool: PgPool) -> Self {
        Self::new(Repository::new(pool))
    }

    /// Underlying repository
    pub fn repository(&self) -> &Repository<E> {
        &self.repo
    }
}

impl<E: Entity> Service<E> {
    pub async fn find_all(&self) -> Result<Vec<E>> {
        self.repo.find_all().await
    }

    pub async fn find_by_id(&self, id: E::Id) -> Result<Option<E>> {
        self.repo.find_by_id(id).await
    }

    pub async fn create(&self, entity: E) -> Result<E> {
        self.repo.create(entity).await
    }

    pub async fn update(&self, entity: E) -> Result<Option<E>> {
        self.repo.update(entity).await
    }

    pub async fn update_columns(
        &self,
        id: E::Id,
        assignments: Vec<(&str, Value)>,
    ) -> Result<Option<E>> {
        self.repo.update_columns(id, assignments).await
    }

    pub async fn update_where(
        &self,
        filter: &Filter,
        assignments: Vec<(&str, Value)>,
    ) -> Result<u64> {
        self.repo.update_where(filter, assignments).await
    }

    pub async fn delete(&self, id: E::Id) -> Result<bool> {
        self.repo.delete(id).await
    }

    pub async fn hard_delete(&self, id: E::Id) -> Result<bool> {
        self.repo.hard_delete(id).await
    }

    pub async fn delete_where(&self, filter: &Filter) -> Result<u64> {
        self.repo.delete_where(filter).await
    }

    pub async fn restore(&self, id: E::Id) -> Result<Option<E>> {
        self.repo.restore(id).await
    }

    pub async fn first(&self, filter: &Filter) -> Result<Option<E>> {
        self.repo.first(filter).await
    }

    pub async fn filter(&self, filter: &Filter) -> Result<Vec<E>> {
        self.repo.filter(filter).await
    }

    pub async fn first_or_create(&self, filter: &Filter, entity: E) -> Result<E> {
        self.repo.first_or_create(filter, entity).await
    }

    pub async fn exists(&self, filter: &Filter) -> Result<bool> {
        self.repo.exists(filter).await
    }

    pub async fn between(
        &self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Result<Vec<E>> {
        self.repo.between(column, low, high).await
    }

    pub async fn in_values(&self, column: &str, values: Vec<Value>) -> Result<Vec<E>> {
        self.repo.in_values(column, values).await
    }

    pub async fn not_in(&self, column: &str, values: Vec<Value>) -> Result<Vec<E>> {
        self.repo.not_in(column, values).await
    }

    pub async fn count(&self, filter: &Filter) -> Result<i64> {
        self.repo.count(filter).await
    }

    pub async fn sum(&self, column: &str) -> Result<f64> {
        self.repo.sum(column).await
    }

    pub async fn avg(&self, column: &str) -> Result<f64> {
        self.repo.avg(column).await
    }

    pub async fn min(&self, column: &str) -> Result<f64> {
        self.repo.min(column).await
    }

    pub async fn max(&self, column: &str) -> Result<f64> {
        self.repo.max(column).await
    }

    pub async fn group_by(&self, column: &str) -> Result<Vec<GroupCount>> {
        self.repo.group_by(column).await
    }

    pub async fn pluck(&self, column: &str) -> Result<Vec<serde_json::Value>> {
        self.repo.pluck(column).await
    }

    pub async fn distinct(&self, column: &str) -> Result<Vec<serde_json::Value>> {
        self.repo.distinct(column).await
    }

    pub async fn order_by(&self, column: &str, direction: Direction) -> Result<Vec<E>> {
        self.repo.order_by(column, direction).await
    }

    pub async fn order_by_multiple(&self, orders: &[OrderBy]) -> Result<Vec<E>> {
        self.repo.order_by_multiple(orders).await
    }

    pub async fn paginate(&self, offset: i64, limit: i64) -> Result<Page<E>> {
        self.repo.paginate(offset, limit).await
    }

    pub async fn search(&self, column: &str, keyword: &str) -> Result<Vec<E>> {
        self.repo.search(column, keyword).await
    }

    pub async fn find_with_trashed(&self) -> Result<Vec<E>> {
        self.repo.find_with_trashed().await
    }

    pub async fn only_trashed(&self) -> Result<Vec<E>> {
        self.repo.only_trashed().await
    }

    pub async fn create_batch(&self, items: Vec<E>, batch_size: usize) -> Result<Vec<E>> {
        self.repo.create_batch(items, batch_size).await
    }

    pub async fn chunk<F>(&self, size: i64, callback: F) -> Result<()>
    where
        F: FnMut(Vec<E>) -> Result<()> + Send,
    {
        self.repo.chunk(size, callback).await
    }

    pub async fn upsert(&self, entity: E, conflict_columns: &[&str]) -> Result<E> {
        self.repo.upsert(entity, conflict_columns).await
    }

    pub async fn find_for_update(&self, id: E::Id) -> Result<Option<E>> {
        self.repo.find_for_update(id).await
    }

    pub async fn with_transaction<R, F>(&self, f: F) -> Result<R>
    where
        R: Send,
        F: for<'r> FnOnce(&'r Repository<E>) -> BoxFuture<'r, Result<R>> + Send,
    {
        self.repo.with_transaction(f).await
    }
}

impl Service<User> {
    /// Visible user with this exact email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.repo.first(&Filter::new().eq("email", email)).await
    }
}

impl Service<Activity> {
    /// Stores one request audit row
    pub async fn log(&self, activity: Activity) -> Result<Activity> {
        self.repo.create(activity).await
    }
}
