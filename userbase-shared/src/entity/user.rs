/// User entity
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY,
///     first_name VARCHAR(255) NOT NULL,
///     last_name VARCHAR(255) NOT NULL,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL,
///     deleted_at TIMESTAMPTZ
/// );
/// ```
///
/// Plaintext passwords only ever live in memory: [`User::new`] and
/// [`User::set_password`] park the plaintext in a non-persisted field, and the
/// `before_create` / `before_update` hooks replace it with an Argon2id hash.
/// A row whose `password` is not a hash is refused before any SQL runs.
///
/// # Example
///
/// ```no_run
/// use userbase_shared::{entity::User, repository::Repository};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let users = Repository::<User>::new(pool);
/// let user = users
///     .create(User::new("Ada", "Lovelace", "ada@example.com", "secret1"))
///     .await?;
/// assert!(user.verify_password("secret1")?);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::{Entity, HookError, Value};
use crate::auth::password::{self, PasswordError};

/// User account
#[derive(Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID, assigned on create
    pub id: Uuid,

    pub first_name: String,

    pub last_name: String,

    /// Unique across all rows, including soft-deleted ones
    pub email: String,

    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set when the user is soft-deleted
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,

    #[sqlx(skip)]
    #[serde(skip)]
    pending_password: Option<String>,
}

impl User {
    /// Builds an unsaved user; id, timestamps and hash are filled in on create
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::nil(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            password: String::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            pending_password: Some(password.into()),
        }
    }

    /// Replaces the password; hashed by the next create or update
    pub fn set_password(&mut self, plain: impl Into<String>) {
        self.pending_password = Some(plain.into());
    }

    /// Checks a plaintext password against the stored hash
    pub fn verify_password(&self, plain: &str) -> Result<bool, PasswordError> {
        password::verify_password(plain, &self.password)
    }

    /// Whether the user has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn hash_pending_password(&mut self) -> Result<(), HookError> {
        if let Some(plain) = self.pending_password.take() {
            self.password = password::hash_password(&plain)?;
        }

        if !password::is_password_hash(&self.password) {
            return Err(HookError::Invariant(
                "user password must be hashed before it is stored".to_string(),
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("deleted_at", &self.deleted_at)
            .finish_non_exhaustive()
    }
}

impl Entity for User {
    type Id = Uuid;

    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "first_name",
        "last_name",
        "email",
        "password",
        "created_at",
        "updated_at",
        "deleted_at",
    ];
    const SOFT_DELETE: bool = true;
    const FILTERABLE: &'static [&'static str] = &[
        "id",
        "first_name",
        "last_name",
        "email",
        "created_at",
        "updated_at",
        "deleted_at",
    ];
    const SORTABLE: &'static [&'static str] = &[
        "id",
        "first_name",
        "last_name",
        "email",
        "created_at",
        "updated_at",
    ];
    const SEARCHABLE: &'static [&'static str] = &["first_name", "last_name", "email"];
    const WRITABLE: &'static [&'static str] = &["first_name", "last_name", "email", "updated_at"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_row(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("first_name", self.first_name.clone().into()),
            ("last_name", self.last_name.clone().into()),
            ("email", self.email.clone().into()),
            ("password", self.password.clone().into()),
            ("created_at", self.created_at.into()),
            ("updated_at", self.updated_at.into()),
            ("deleted_at", self.deleted_at.into()),
        ]
    }

    fn before_create(&mut self) -> Result<(), HookError> {
        if self.id.is_nil() {
            self.id = Uuid::new_v4();
        }

        let now = Utc::now();
        self.created_at = now;
        self.updated_at = now;

        self.hash_pending_password()
    }

    fn before_update(&mut self) -> Result<(), HookError> {
        self.updated_at = Utc::now();
        self.hash_pending_password()
    }
}
