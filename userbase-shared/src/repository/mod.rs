/// Generic data access over [`Entity`] types
///
/// A [`Repository`] is bound to one entity type and one store handle: either
/// the connection pool or an open transaction. Every operation builds its SQL
/// through [`query::Statement`], so identifiers come from the entity's
/// allow-lists and values are always bind parameters. Driver errors are
/// returned unchanged inside [`RepositoryError::Database`]; there is no retry.
///
/// # Example
///
/// ```no_run
/// use userbase_shared::entity::User;
/// use userbase_shared::repository::{Filter, Repository};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let users = Repository::<User>::new(pool);
///
/// let page = users.paginate(0, 10).await?;
/// println!("{} of {} users", page.data.len(), page.total);
///
/// let lovelaces = users.filter(&Filter::new().eq("last_name", "Lovelace")).await?;
///
/// users
///     .with_transaction(|tx| {
///         Box::pin(async move {
///             let user = tx.create(User::new("Ada", "Lovelace", "ada@example.com", "secret1")).await?;
///             tx.delete(user.id).await?;
///             Ok(())
///         })
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```

use chrono::Utc;
use futures::future::BoxFuture;
use sqlx::{postgres::PgRow, FromRow, PgPool, Postgres, Transaction};
use std::{marker::PhantomData, sync::Arc};
use tokio::sync::Mutex;
use tracing::{trace, warn};

use crate::entity::{Entity, Value, DELETED_AT_COLUMN};

pub mod error;
pub mod query;

pub use error::{ColumnPurpose, RepositoryError, Result};
pub use query::{Condition, Direction, Filter, GroupCount, Operator, OrderBy, Page, Scope, Statement};

use query::{allowed_column, Aggregate};

/// Columns never rewritten by a full-record update or an upsert
const IMMUTABLE_COLUMNS: &[&str] = &["id", "created_at", DELETED_AT_COLUMN];

/// Store handle a repository runs its statements on
#[derive(Clone)]
enum Handle {
    Pool(PgPool),
    /// Shared so that rebound repositories reuse the same transaction;
    /// `None` once it has been committed or rolled back
    Transaction(Arc<Mutex<Option<Transaction<'static, Postgres>>>>),
}

/// Data access for entity `E`
pub struct Repository<E> {
    handle: Handle,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &std::any::type_name::<E>())
            .field("transactional", &self.is_transactional())
            .finish()
    }
}

impl<E> Repository<E> {
    /// Creates a repository on the connection pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            handle: Handle::Pool(pool),
            _entity: PhantomData,
        }
    }

    /// Repository for another entity on the same handle
    ///
    /// Inside [`with_transaction`](Repository::with_transaction) this is how
    /// several entity types share one transaction.
    pub fn rebind<O>(&self) -> Repository<O> {
        Repository {
            handle: self.handle.clone(),
            _entity: PhantomData,
        }
    }

    /// Whether this repository is bound to a transaction
    pub fn is_transactional(&self) -> bool {
        matches!(self.handle, Handle::Transaction(_))
    }
}

impl<E: Entity> Repository<E> {
    async fn fetch_all<T>(&self, mut stmt: Statement<E>) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        trace!(sql = stmt.sql(), "executing query");
        let query = stmt.builder().build_query_as::<T>();

        let rows = match &self.handle {
            Handle::Pool(pool) => query.fetch_all(pool).await?,
            Handle::Transaction(tx) => {
                let mut guard = tx.lock().await;
                let tx = guard.as_mut().ok_or(RepositoryError::TransactionClosed)?;
                query.fetch_all(&mut **tx).await?
            }
        };

        Ok(rows)
    }

    async fn fetch_optional<T>(&self, mut stmt: Statement<E>) -> Result<Option<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        trace!(sql = stmt.sql(), "executing query");
        let query = stmt.builder().build_query_as::<T>();

        let row = match &self.handle {
            Handle::Pool(pool) => query.fetch_optional(pool).await?,
            Handle::Transaction(tx) => {
                let mut guard = tx.lock().await;
                let tx = guard.as_mut().ok_or(RepositoryError::TransactionClosed)?;
                query.fetch_optional(&mut **tx).await?
            }
        };

        Ok(row)
    }

    async fn fetch_one<T>(&self, mut stmt: Statement<E>) -> Result<T>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        trace!(sql = stmt.sql(), "executing query");
        let query = stmt.builder().build_query_as::<T>();

        let row = match &self.handle {
            Handle::Pool(pool) => query.fetch_one(pool).await?,
            Handle::Transaction(tx) => {
                let mut guard = tx.lock().await;
                let tx = guard.as_mut().ok_or(RepositoryError::TransactionClosed)?;
                query.fetch_one(&mut **tx).await?
            }
        };

        Ok(row)
    }

    /// Runs a statement and returns the number of affected rows
    async fn execute(&self, mut stmt: Statement<E>) -> Result<u64> {
        trace!(sql = stmt.sql(), "executing statement");
        let query = stmt.builder().build();

        let result = match &self.handle {
            Handle::Pool(pool) => query.execute(pool).await?,
            Handle::Transaction(tx) => {
                let mut guard = tx.lock().await;
                let tx = guard.as_mut().ok_or(RepositoryError::TransactionClosed)?;
                query.execute(&mut **tx).await?
            }
        };

        Ok(result.rows_affected())
    }

    async fn scalar(&self, stmt: Statement<E>) -> Result<f64> {
        let (value,): (f64,) = self.fetch_one(stmt).await?;
        Ok(value)
    }

    // ----- CRUD -----

    /// Every visible row
    pub async fn find_all(&self) -> Result<Vec<E>> {
        self.fetch_all(Statement::select(Scope::Active)).await
    }

    /// Visible row with the given primary key
    pub async fn find_by_id(&self, id: E::Id) -> Result<Option<E>> {
        let mut stmt = Statement::select(Scope::Active);
        stmt.id_eq(id);
        self.fetch_optional(stmt).await
    }

    /// Inserts a record after running its `before_create` hook
    ///
    /// Returns the stored row, including database-assigned columns.
    pub async fn create(&self, mut entity: E) -> Result<E> {
        entity.before_create()?;

        let mut stmt = Statement::insert(vec![entity.to_row()])?;
        stmt.returning();
        self.fetch_one(stmt).await
    }

    /// Rewrites every mutable column of a visible record after running its
    /// `before_update` hook
    ///
    /// Returns `None` when no visible row has the record's id.
    pub async fn update(&self, mut entity: E) -> Result<Option<E>> {
        entity.before_update()?;

        let id = entity.id();
        let assignments = entity
            .to_row()
            .into_iter()
            .filter(|(column, _)| !IMMUTABLE_COLUMNS.contains(column));

        let mut stmt = Statement::update(assignments, E::COLUMNS)?;
        stmt.scope(Scope::Active).id_eq(id).returning();
        self.fetch_optional(stmt).await
    }

    /// Assigns writable columns on one visible record
    ///
    /// `updated_at` is stamped automatically when the entity allows writing it.
    pub async fn update_columns(
        &self,
        id: E::Id,
        assignments: Vec<(&str, Value)>,
    ) -> Result<Option<E>> {
        let mut stmt = Statement::update(stamp_updated_at::<E>(assignments), E::WRITABLE)?;
        stmt.scope(Scope::Active).id_eq(id).returning();
        self.fetch_optional(stmt).await
    }

    /// Assigns writable columns on every visible record matching `filter`
    pub async fn update_where(
        &self,
        filter: &Filter,
        assignments: Vec<(&str, Value)>,
    ) -> Result<u64> {
        let mut stmt = Statement::update(stamp_updated_at::<E>(assignments), E::WRITABLE)?;
        stmt.scope(Scope::Active).filter(filter)?;
        self.execute(stmt).await
    }

    /// Deletes a visible record; soft when the entity supports it
    ///
    /// Returns whether a row was affected.
    pub async fn delete(&self, id: E::Id) -> Result<bool> {
        let mut stmt = if E::SOFT_DELETE {
            Statement::set_deleted(true)?
        } else {
            Statement::delete()
        };
        stmt.scope(Scope::Active).id_eq(id);
        Ok(self.execute(stmt).await? > 0)
    }

    /// Erases a record, trashed or not
    pub async fn hard_delete(&self, id: E::Id) -> Result<bool> {
        let mut stmt = Statement::delete();
        stmt.id_eq(id);
        Ok(self.execute(stmt).await? > 0)
    }

    /// Deletes every visible record matching `filter`; soft when supported
    pub async fn delete_where(&self, filter: &Filter) -> Result<u64> {
        let mut stmt = if E::SOFT_DELETE {
            Statement::set_deleted(true)?
        } else {
            Statement::delete()
        };
        stmt.scope(Scope::Active).filter(filter)?;
        self.execute(stmt).await
    }

    /// Clears `deleted_at` on a trashed record
    ///
    /// Returns `None` when no trashed row has this id.
    pub async fn restore(&self, id: E::Id) -> Result<Option<E>> {
        let mut stmt = Statement::set_deleted(false)?;
        stmt.scope(Scope::OnlyTrashed).id_eq(id).returning();
        self.fetch_optional(stmt).await
    }

    // ----- Lookup and filter -----

    /// Lowest-id visible record matching `filter`
    pub async fn first(&self, filter: &Filter) -> Result<Option<E>> {
        let mut stmt = Statement::select(Scope::Active);
        stmt.filter(filter)?.order_by_id().push(" LIMIT 1");
        self.fetch_optional(stmt).await
    }

    /// Every visible record matching `filter`
    pub async fn filter(&self, filter: &Filter) -> Result<Vec<E>> {
        let mut stmt = Statement::select(Scope::Active);
        stmt.filter(filter)?;
        self.fetch_all(stmt).await
    }

    /// Returns the first match for `filter`, creating `entity` when none exists
    ///
    /// Lookup and insert are separate statements; run inside
    /// [`with_transaction`](Repository::with_transaction) or rely on a unique
    /// constraint when concurrent callers may race.
    pub async fn first_or_create(&self, filter: &Filter, entity: E) -> Result<E> {
        match self.first(filter).await? {
            Some(existing) => Ok(existing),
            None => self.create(entity).await,
        }
    }

    /// Whether any visible record matches `filter`
    pub async fn exists(&self, filter: &Filter) -> Result<bool> {
        let mut stmt = Statement::select_expr("1", Scope::Active);
        stmt.filter(filter)?.push(" LIMIT 1");
        let row: Option<(i32,)> = self.fetch_optional(stmt).await?;
        Ok(row.is_some())
    }

    // ----- Range and set -----

    /// Visible records with `low <= column <= high`
    pub async fn between(
        &self,
        column: &str,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Result<Vec<E>> {
        let mut stmt = Statement::select(Scope::Active);
        stmt.between(column, low.into(), high.into())?;
        self.fetch_all(stmt).await
    }

    /// Visible records whose `column` is one of `values`
    pub async fn in_values(&self, column: &str, values: Vec<Value>) -> Result<Vec<E>> {
        let mut stmt = Statement::select(Scope::Active);
        stmt.in_list(column, values, false)?;
        self.fetch_all(stmt).await
    }

    /// Visible records whose `column` is none of `values`
    pub async fn not_in(&self, column: &str, values: Vec<Value>) -> Result<Vec<E>> {
        let mut stmt = Statement::select(Scope::Active);
        stmt.in_list(column, values, true)?;
        self.fetch_all(stmt).await
    }

    // ----- Aggregates -----

    /// Number of visible records matching `filter`
    pub async fn count(&self, filter: &Filter) -> Result<i64> {
        let mut stmt = Statement::count(Scope::Active);
        stmt.filter(filter)?;
        let (count,): (i64,) = self.fetch_one(stmt).await?;
        Ok(count)
    }

    pub async fn sum(&self, column: &str) -> Result<f64> {
        self.scalar(Statement::aggregate(Aggregate::Sum, column)?).await
    }

    pub async fn avg(&self, column: &str) -> Result<f64> {
        self.scalar(Statement::aggregate(Aggregate::Avg, column)?).await
    }

    pub async fn min(&self, column: &str) -> Result<f64> {
        self.scalar(Statement::aggregate(Aggregate::Min, column)?).await
    }

    pub async fn max(&self, column: &str) -> Result<f64> {
        self.scalar(Statement::aggregate(Aggregate::Max, column)?).await
    }

    /// Visible record count per distinct value of `column`
    pub async fn group_by(&self, column: &str) -> Result<Vec<GroupCount>> {
        let column = allowed_column::<E>(column, E::FILTERABLE, ColumnPurpose::Filter)?;
        let mut stmt = Statement::select_expr(
            &format!("to_jsonb({}) AS value, COUNT(*) AS count", column),
            Scope::Active,
        );
        stmt.group_by(column).push(" ORDER BY 1");
        self.fetch_all(stmt).await
    }

    /// Values of one column across visible records, in id order
    pub async fn pluck(&self, column: &str) -> Result<Vec<serde_json::Value>> {
        let column = allowed_column::<E>(column, E::FILTERABLE, ColumnPurpose::Filter)?;
        let mut stmt = Statement::select_expr(&format!("to_jsonb({})", column), Scope::Active);
        stmt.order_by_id();
        let rows: Vec<(serde_json::Value,)> = self.fetch_all(stmt).await?;
        Ok(rows.into_iter().map(|(value,)| value).collect())
    }

    /// Distinct values of one column across visible records
    pub async fn distinct(&self, column: &str) -> Result<Vec<serde_json::Value>> {
        let column = allowed_column::<E>(column, E::FILTERABLE, ColumnPurpose::Filter)?;
        let mut stmt =
            Statement::select_expr(&format!("DISTINCT to_jsonb({})", column), Scope::Active);
        stmt.push(" ORDER BY 1");
        let rows: Vec<(serde_json::Value,)> = self.fetch_all(stmt).await?;
        Ok(rows.into_iter().map(|(value,)| value).collect())
    }

    // ----- Ordering -----

    pub async fn order_by(&self, column: &str, direction: Direction) -> Result<Vec<E>> {
        self.order_by_multiple(&[OrderBy {
            column: column.to_string(),
            direction,
        }])
        .await
    }

    pub async fn order_by_multiple(&self, orders: &[OrderBy]) -> Result<Vec<E>> {
        let mut stmt = Statement::select(Scope::Active);
        stmt.order_by(orders)?;
        self.fetch_all(stmt).await
    }

    // ----- Pagination and search -----

    /// One page of visible records in primary-key order
    ///
    /// Negative arguments are treated as zero.
    pub async fn paginate(&self, offset: i64, limit: i64) -> Result<Page<E>> {
        let total = self.count(&Filter::new()).await?;

        let mut stmt = Statement::select(Scope::Active);
        stmt.order_by_id().limit_offset(limit.max(0), offset.max(0));
        let data = self.fetch_all(stmt).await?;

        Ok(Page { total, data })
    }

    /// Visible records whose `column` contains `keyword`
    pub async fn search(&self, column: &str, keyword: &str) -> Result<Vec<E>> {
        let mut stmt = Statement::select(Scope::Active);
        stmt.search(column, keyword)?;
        self.fetch_all(stmt).await
    }

    // ----- Soft-delete views -----

    pub async fn find_with_trashed(&self) -> Result<Vec<E>> {
        self.fetch_all(Statement::select(Scope::WithTrashed)).await
    }

    pub async fn only_trashed(&self) -> Result<Vec<E>> {
        if !E::SOFT_DELETE {
            return Err(RepositoryError::SoftDeleteUnsupported { table: E::TABLE });
        }
        self.fetch_all(Statement::select(Scope::OnlyTrashed)).await
    }

    // ----- Batch and iteration -----

    /// Inserts `items` in multi-row statements of `batch_size` rows
    ///
    /// Hooks run for every item before anything is written; all batches share
    /// one transaction.
    pub async fn create_batch(&self, items: Vec<E>, batch_size: usize) -> Result<Vec<E>> {
        if batch_size == 0 {
            return Err(RepositoryError::InvalidArgument(
                "batch size must be positive".to_string(),
            ));
        }
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut rows = Vec::with_capacity(items.len());
        for mut item in items {
            item.before_create()?;
            rows.push(item.to_row());
        }

        self.with_transaction(move |repo| {
            Box::pin(async move {
                let mut created = Vec::with_capacity(rows.len());
                let mut rows = rows.into_iter().peekable();

                while rows.peek().is_some() {
                    let batch: Vec<_> = rows.by_ref().take(batch_size).collect();
                    let mut stmt = Statement::insert(batch)?;
                    stmt.returning();
                    created.extend(repo.fetch_all::<E>(stmt).await?);
                }

                Ok(created)
            })
        })
        .await
    }

    /// Feeds every visible record to `callback` in primary-key order, `size`
    /// records at a time
    ///
    /// Stops at the first callback error and returns it.
    pub async fn chunk<F>(&self, size: i64, mut callback: F) -> Result<()>
    where
        F: FnMut(Vec<E>) -> Result<()> + Send,
    {
        if size <= 0 {
            return Err(RepositoryError::InvalidArgument(
                "chunk size must be positive".to_string(),
            ));
        }

        let mut offset = 0;
        loop {
            let mut stmt = Statement::select(Scope::Active);
            stmt.order_by_id().limit_offset(size, offset);
            let rows: Vec<E> = self.fetch_all(stmt).await?;

            let fetched = rows.len() as i64;
            if fetched == 0 {
                return Ok(());
            }

            callback(rows)?;

            if fetched < size {
                return Ok(());
            }
            offset += size;
        }
    }

    /// Inserts `entity`, or updates the conflicting row from its values
    ///
    /// Every column except the key, `created_at`, `deleted_at` and the
    /// conflict target is taken from `EXCLUDED`.
    pub async fn upsert(&self, mut entity: E, conflict_columns: &[&str]) -> Result<E> {
        entity.before_create()?;

        let row = entity.to_row();
        let update_columns: Vec<&'static str> = row
            .iter()
            .map(|(column, _)| *column)
            .filter(|column| !IMMUTABLE_COLUMNS.contains(column))
            .collect();

        let mut stmt = Statement::insert(vec![row])?;
        stmt.on_conflict_update(conflict_columns, &update_columns)?
            .returning();
        self.fetch_one(stmt).await
    }

    /// Reads a visible record and locks its row until the surrounding
    /// transaction ends
    pub async fn find_for_update(&self, id: E::Id) -> Result<Option<E>> {
        let mut stmt = Statement::select(Scope::Active);
        stmt.id_eq(id).push(" FOR UPDATE");
        self.fetch_optional(stmt).await
    }

    // ----- Transactions -----

    /// Runs `f` with a repository bound to a transaction
    ///
    /// Commits when `f` returns `Ok`, rolls back on `Err`. A repository that
    /// is already transactional passes itself to `f` and leaves commit or
    /// rollback to the outer scope.
    pub async fn with_transaction<R, F>(&self, f: F) -> Result<R>
    where
        R: Send,
        F: for<'r> FnOnce(&'r Repository<E>) -> BoxFuture<'r, Result<R>> + Send,
    {
        let pool = match &self.handle {
            Handle::Pool(pool) => pool,
            Handle::Transaction(_) => return f(self).await,
        };

        let shared = Arc::new(Mutex::new(Some(pool.begin().await?)));
        let scoped = Repository::<E> {
            handle: Handle::Transaction(Arc::clone(&shared)),
            _entity: PhantomData,
        };

        let outcome = f(&scoped).await;

        let tx = shared
            .lock()
            .await
            .take()
            .ok_or(RepositoryError::TransactionClosed)?;

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Failed to roll back transaction");
                }
                Err(err)
            }
        }
    }
}

/// Adds `updated_at = now` when the entity lets column-wise updates write it
/// and the caller did not
fn stamp_updated_at<'a, E: Entity>(mut assignments: Vec<(&'a str, Value)>) -> Vec<(&'a str, Value)> {
    let writable = E::WRITABLE.contains(&"updated_at");
    let provided = assignments.iter().any(|(column, _)| *column == "updated_at");

    if writable && !provided && !assignments.is_empty() {
        assignments.push(("updated_at", Utc::now().into()));
    }
    assignments
}
