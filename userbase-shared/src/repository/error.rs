use std::fmt;

use crate::entity::HookError;

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// What a caller-supplied column name was going to be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnPurpose {
    Filter,
    Sort,
    Aggregate,
    Search,
    Write,
    Conflict,
}

impl fmt::Display for ColumnPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnPurpose::Filter => "filtering",
            ColumnPurpose::Sort => "sorting",
            ColumnPurpose::Aggregate => "aggregation",
            ColumnPurpose::Search => "search",
            ColumnPurpose::Write => "writing",
            ColumnPurpose::Conflict => "conflict detection",
        };
        f.write_str(name)
    }
}

/// Error type for repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Error reported by the database driver, unchanged
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Column name is not on the entity's allow-list for this purpose
    #[error("column `{column}` is not allowed for {purpose} on `{table}`")]
    ColumnNotAllowed {
        table: &'static str,
        column: String,
        purpose: ColumnPurpose,
    },

    /// A lifecycle hook refused the write
    #[error(transparent)]
    Hook(#[from] HookError),

    /// Trash operations on an entity without `deleted_at`
    #[error("`{table}` does not support soft delete")]
    SoftDeleteUnsupported { table: &'static str },

    /// The transaction backing this repository was already finished
    #[error("transaction is no longer open")]
    TransactionClosed,

    /// Argument outside the accepted range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl RepositoryError {
    /// True when the database reported that no row matched
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::Database(sqlx::Error::RowNotFound))
    }
}
