/// Persisted record types
///
/// Every table the repository layer can talk to is described by an
/// [`Entity`] implementation: table name, column list, soft-delete support,
/// the column allow-lists that gate which identifiers may appear in generated
/// SQL, and lifecycle hooks run before writes.
///
/// # Entities
///
/// - [`user::User`]: accounts, soft-deletable, password hashed by hooks
/// - [`activity::Activity`]: append-only request audit rows

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, FromRow};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::auth::password::PasswordError;

pub mod activity;
pub mod user;

pub use activity::Activity;
pub use user::User;

/// Column holding the soft-delete timestamp
pub const DELETED_AT_COLUMN: &str = "deleted_at";

/// Dynamically typed value bound into generated queries
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Null,
}

impl Value {
    /// True for [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Error raised by a lifecycle hook; aborts the write
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// Hashing a pending password failed
    #[error(transparent)]
    Password(#[from] PasswordError),

    /// The record would violate an entity invariant
    #[error("{0}")]
    Invariant(String),
}

/// A table-backed record type
///
/// The allow-lists are the only source of column names the repository will
/// interpolate into SQL; any other name is rejected before a query is built.
pub trait Entity: for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin + 'static {
    /// Primary key type
    type Id: Into<Value> + Clone + Send + Sync + fmt::Display + FromStr + 'static;

    /// Table name
    const TABLE: &'static str;

    /// Primary key column
    const ID_COLUMN: &'static str = "id";

    /// Every column, in `SELECT` order
    const COLUMNS: &'static [&'static str];

    /// Whether the table has a `deleted_at` column and deletes are soft
    const SOFT_DELETE: bool = false;

    /// Columns usable in `WHERE`, `GROUP BY`, pluck and distinct
    const FILTERABLE: &'static [&'static str];

    /// Columns usable in `ORDER BY`
    const SORTABLE: &'static [&'static str];

    /// Numeric columns usable in SUM/AVG/MIN/MAX
    const AGGREGABLE: &'static [&'static str] = &[];

    /// Text columns usable in substring search
    const SEARCHABLE: &'static [&'static str] = &[];

    /// Columns that may be assigned by column-wise updates
    ///
    /// Columns maintained by hooks (password hashes) stay off this list so
    /// they can only change through a full [`before_update`](Entity::before_update) pass.
    const WRITABLE: &'static [&'static str] = &[];

    /// Primary key of this record
    fn id(&self) -> Self::Id;

    /// Column/value pairs written on insert
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Runs before the record is inserted
    fn before_create(&mut self) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs before the record is updated
    fn before_update(&mut self) -> Result<(), HookError> {
        Ok(())
    }
}
