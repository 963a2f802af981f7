/// SQL generation for [`Repository`](super::Repository)
///
/// [`Statement`] wraps a `sqlx::QueryBuilder` for one entity. Identifiers come
/// only from the entity's `&'static str` allow-lists; caller-supplied names
/// are looked up there first and rejected with
/// [`RepositoryError::ColumnNotAllowed`] when absent. Values are always bind
/// parameters.

use serde::Serialize;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::{fmt, marker::PhantomData, str::FromStr};

use super::error::{ColumnPurpose, RepositoryError, Result};
use crate::entity::{Entity, Value, DELETED_AT_COLUMN};

/// Comparison operator of a [`Condition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    IsNull,
    IsNotNull,
}

impl Operator {
    fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

/// One `column <op> value` predicate
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: Operator,
    pub value: Value,
}

/// Conjunction of conditions
///
/// ```
/// use userbase_shared::repository::Filter;
///
/// let filter = Filter::new()
///     .eq("last_name", "Lovelace")
///     .ge("created_at", chrono::Utc::now() - chrono::Duration::days(7));
/// assert_eq!(filter.conditions().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(mut self, column: impl Into<String>, op: Operator, value: Value) -> Self {
        self.conditions.push(Condition {
            column: column.into(),
            op,
            value,
        });
        self
    }

    /// `column = value`; a null value renders as `IS NULL`
    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Operator::Eq, value.into())
    }

    /// `column <> value`; a null value renders as `IS NOT NULL`
    pub fn ne(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Operator::Ne, value.into())
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Operator::Lt, value.into())
    }

    pub fn le(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Operator::Le, value.into())
    }

    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Operator::Gt, value.into())
    }

    pub fn ge(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Operator::Ge, value.into())
    }

    /// `column LIKE pattern`; the pattern is bound as given
    pub fn like(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.with(column, Operator::Like, Value::Text(pattern.into()))
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.with(column, Operator::IsNull, Value::Null)
    }

    pub fn is_not_null(self, column: impl Into<String>) -> Self {
        self.with(column, Operator::IsNotNull, Value::Null)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Builds an equality filter from column/value pairs
impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Filter::new(), |filter, (column, value)| filter.eq(column, value))
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(RepositoryError::InvalidArgument(format!(
                "unknown sort direction `{}`",
                other
            ))),
        }
    }
}

/// One `ORDER BY` key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }
}

/// Which rows of a soft-deletable table a read sees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Rows without `deleted_at`
    Active,
    /// Every row
    WithTrashed,
    /// Only soft-deleted rows
    OnlyTrashed,
}

/// One page of results plus the total number of visible rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<E> {
    pub total: i64,
    pub data: Vec<E>,
}

/// Row count per distinct value of a column
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct GroupCount {
    pub value: serde_json::Value,
    pub count: i64,
}

/// Looks `column` up in `allowed`, returning the static name on success
pub(crate) fn allowed_column<E: Entity>(
    column: &str,
    allowed: &'static [&'static str],
    purpose: ColumnPurpose,
) -> Result<&'static str> {
    allowed
        .iter()
        .copied()
        .find(|candidate| *candidate == column)
        .ok_or_else(|| RepositoryError::ColumnNotAllowed {
            table: E::TABLE,
            column: column.to_string(),
            purpose,
        })
}

/// Aggregate function applied by the numeric helpers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Aggregate {
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        })
    }
}

/// A statement under construction for entity `E`
pub struct Statement<E> {
    qb: QueryBuilder<'static, Postgres>,
    has_where: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Statement<E> {
    fn new(sql: String) -> Self {
        Self {
            qb: QueryBuilder::new(sql),
            has_where: false,
            _entity: PhantomData,
        }
    }

    /// `SELECT <all columns> FROM <table>` restricted to `scope`
    pub fn select(scope: Scope) -> Self {
        let mut stmt = Self::new(format!("SELECT {} FROM {}", E::COLUMNS.join(", "), E::TABLE));
        stmt.scope(scope);
        stmt
    }

    /// `SELECT <expr> FROM <table>` restricted to `scope`
    ///
    /// `expr` must be assembled from allow-listed identifiers only.
    pub(crate) fn select_expr(expr: &str, scope: Scope) -> Self {
        let mut stmt = Self::new(format!("SELECT {} FROM {}", expr, E::TABLE));
        stmt.scope(scope);
        stmt
    }

    /// `SELECT COUNT(*)` restricted to `scope`
    pub fn count(scope: Scope) -> Self {
        Self::select_expr("COUNT(*)", scope)
    }

    /// Numeric aggregate over an aggregable column, `0` for empty input
    pub(crate) fn aggregate(function: Aggregate, column: &str) -> Result<Self> {
        let column = allowed_column::<E>(column, E::AGGREGABLE, ColumnPurpose::Aggregate)?;
        Ok(Self::select_expr(
            &format!(
                "COALESCE(CAST({}({}) AS DOUBLE PRECISION), 0)",
                function, column
            ),
            Scope::Active,
        ))
    }

    /// `UPDATE <table> SET ` with the given assignments
    ///
    /// Assignment columns must be in `writable`.
    pub(crate) fn update<'a>(
        assignments: impl IntoIterator<Item = (&'a str, Value)>,
        writable: &'static [&'static str],
    ) -> Result<Self> {
        let mut stmt = Self::new(format!("UPDATE {} SET ", E::TABLE));
        let mut first = true;

        for (column, value) in assignments {
            let column = allowed_column::<E>(column, writable, ColumnPurpose::Write)?;
            if !first {
                stmt.qb.push(", ");
            }
            stmt.qb.push(column).push(" = ");
            push_value(&mut stmt.qb, value);
            first = false;
        }

        if first {
            return Err(RepositoryError::InvalidArgument(
                "update requires at least one column".to_string(),
            ));
        }

        Ok(stmt)
    }

    /// `UPDATE <table> SET deleted_at = <NOW() | NULL>`
    pub(crate) fn set_deleted(deleted: bool) -> Result<Self> {
        if !E::SOFT_DELETE {
            return Err(RepositoryError::SoftDeleteUnsupported { table: E::TABLE });
        }

        let value = if deleted { "NOW()" } else { "NULL" };
        Ok(Self::new(format!(
            "UPDATE {} SET {} = {}",
            E::TABLE,
            DELETED_AT_COLUMN,
            value
        )))
    }

    /// `DELETE FROM <table>`
    pub fn delete() -> Self {
        Self::new(format!("DELETE FROM {}", E::TABLE))
    }

    /// Multi-row `INSERT` of already-hooked rows
    ///
    /// Every row must list the same columns in the same order.
    pub(crate) fn insert(rows: Vec<Vec<(&'static str, Value)>>) -> Result<Self> {
        let columns: Vec<&'static str> = rows
            .first()
            .map(|row| row.iter().map(|(column, _)| *column).collect())
            .ok_or_else(|| RepositoryError::InvalidArgument("nothing to insert".to_string()))?;

        let mut stmt = Self::new(format!(
            "INSERT INTO {} ({}) VALUES ",
            E::TABLE,
            columns.join(", ")
        ));

        for (index, row) in rows.into_iter().enumerate() {
            if index > 0 {
                stmt.qb.push(", ");
            }
            stmt.qb.push("(");
            for (position, (_, value)) in row.into_iter().enumerate() {
                if position > 0 {
                    stmt.qb.push(", ");
                }
                push_value(&mut stmt.qb, value);
            }
            stmt.qb.push(")");
        }

        Ok(stmt)
    }

    /// `ON CONFLICT (..) DO UPDATE SET c = EXCLUDED.c` for every column in
    /// `update_columns` that is not part of the conflict target
    pub(crate) fn on_conflict_update(
        &mut self,
        conflict_columns: &[&str],
        update_columns: &[&'static str],
    ) -> Result<&mut Self> {
        if conflict_columns.is_empty() {
            return Err(RepositoryError::InvalidArgument(
                "upsert requires at least one conflict column".to_string(),
            ));
        }

        let targets = conflict_columns
            .iter()
            .map(|column| allowed_column::<E>(column, E::COLUMNS, ColumnPurpose::Conflict))
            .collect::<Result<Vec<_>>>()?;

        let assignments: Vec<String> = update_columns
            .iter()
            .filter(|column| !targets.contains(column))
            .map(|column| format!("{0} = EXCLUDED.{0}", column))
            .collect();

        self.qb.push(format!(" ON CONFLICT ({})", targets.join(", ")));
        if assignments.is_empty() {
            self.qb.push(" DO NOTHING");
        } else {
            self.qb.push(format!(" DO UPDATE SET {}", assignments.join(", ")));
        }

        Ok(self)
    }

    /// Starts the next predicate with ` WHERE ` or ` AND `
    fn and(&mut self) -> &mut QueryBuilder<'static, Postgres> {
        self.qb
            .push(if self.has_where { " AND " } else { " WHERE " });
        self.has_where = true;
        &mut self.qb
    }

    /// Adds the soft-delete predicate for `scope`
    pub fn scope(&mut self, scope: Scope) -> &mut Self {
        if E::SOFT_DELETE {
            match scope {
                Scope::Active => {
                    self.and().push(format!("{} IS NULL", DELETED_AT_COLUMN));
                }
                Scope::OnlyTrashed => {
                    self.and().push(format!("{} IS NOT NULL", DELETED_AT_COLUMN));
                }
                Scope::WithTrashed => {}
            }
        }
        self
    }

    /// Adds every condition of `filter`
    pub fn filter(&mut self, filter: &Filter) -> Result<&mut Self> {
        for condition in filter.conditions() {
            let column =
                allowed_column::<E>(&condition.column, E::FILTERABLE, ColumnPurpose::Filter)?;

            match (condition.op, &condition.value) {
                (Operator::IsNull, _) | (Operator::Eq, Value::Null) => {
                    self.and().push(format!("{} IS NULL", column));
                }
                (Operator::IsNotNull, _) | (Operator::Ne, Value::Null) => {
                    self.and().push(format!("{} IS NOT NULL", column));
                }
                (op, value) => {
                    let qb = self.and();
                    qb.push(format!("{} {} ", column, op.as_sql()));
                    push_value(qb, value.clone());
                }
            }
        }
        Ok(self)
    }

    /// `<id column> = $n`
    pub fn id_eq(&mut self, id: E::Id) -> &mut Self {
        let qb = self.and();
        qb.push(format!("{} = ", E::ID_COLUMN));
        push_value(qb, id.into());
        self
    }

    /// `column BETWEEN $n AND $m`
    pub fn between(&mut self, column: &str, low: Value, high: Value) -> Result<&mut Self> {
        let column = allowed_column::<E>(column, E::FILTERABLE, ColumnPurpose::Filter)?;
        let qb = self.and();
        qb.push(format!("{} BETWEEN ", column));
        push_value(qb, low);
        qb.push(" AND ");
        push_value(qb, high);
        Ok(self)
    }

    /// `column [NOT] IN ($n, ...)`; an empty list matches nothing for `IN`
    /// and everything for `NOT IN`
    pub fn in_list(&mut self, column: &str, values: Vec<Value>, negated: bool) -> Result<&mut Self> {
        let column = allowed_column::<E>(column, E::FILTERABLE, ColumnPurpose::Filter)?;
        let qb = self.and();

        if values.is_empty() {
            qb.push(if negated { "TRUE" } else { "FALSE" });
            return Ok(self);
        }

        qb.push(format!("{} {}IN (", column, if negated { "NOT " } else { "" }));
        for (index, value) in values.into_iter().enumerate() {
            if index > 0 {
                qb.push(", ");
            }
            push_value(qb, value);
        }
        qb.push(")");
        Ok(self)
    }

    /// `column LIKE '%keyword%'` on a searchable column
    pub fn search(&mut self, column: &str, keyword: &str) -> Result<&mut Self> {
        let column = allowed_column::<E>(column, E::SEARCHABLE, ColumnPurpose::Search)?;
        self.and()
            .push(format!("{} LIKE ", column))
            .push_bind(format!("%{}%", keyword));
        Ok(self)
    }

    /// `GROUP BY column`
    pub(crate) fn group_by(&mut self, column: &'static str) -> &mut Self {
        self.qb.push(format!(" GROUP BY {}", column));
        self
    }

    /// `ORDER BY` over sortable columns
    pub fn order_by(&mut self, orders: &[OrderBy]) -> Result<&mut Self> {
        let keys = orders
            .iter()
            .map(|order| {
                allowed_column::<E>(&order.column, E::SORTABLE, ColumnPurpose::Sort)
                    .map(|column| format!("{} {}", column, order.direction.as_sql()))
            })
            .collect::<Result<Vec<_>>>()?;

        if !keys.is_empty() {
            self.qb.push(format!(" ORDER BY {}", keys.join(", ")));
        }
        Ok(self)
    }

    /// `ORDER BY <id column>`
    pub fn order_by_id(&mut self) -> &mut Self {
        self.qb.push(format!(" ORDER BY {}", E::ID_COLUMN));
        self
    }

    /// `LIMIT $n OFFSET $m`
    pub fn limit_offset(&mut self, limit: i64, offset: i64) -> &mut Self {
        self.qb
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        self
    }

    /// Appends a fixed SQL fragment
    pub(crate) fn push(&mut self, sql: &'static str) -> &mut Self {
        self.qb.push(sql);
        self
    }

    /// `RETURNING <all columns>`
    pub fn returning(&mut self) -> &mut Self {
        self.qb
            .push(format!(" RETURNING {}", E::COLUMNS.join(", ")));
        self
    }

    /// SQL text generated so far
    pub fn sql(&self) -> &str {
        self.qb.sql()
    }

    pub(crate) fn builder(&mut self) -> &mut QueryBuilder<'static, Postgres> {
        &mut self.qb
    }
}

fn push_value(qb: &mut QueryBuilder<'static, Postgres>, value: Value) {
    match value {
        Value::Text(v) => qb.push_bind(v),
        Value::Int(v) => qb.push_bind(v),
        Value::Float(v) => qb.push_bind(v),
        Value::Bool(v) => qb.push_bind(v),
        Value::Uuid(v) => qb.push_bind(v),
        Value::Timestamp(v) => qb.push_bind(v),
        Value::Null => qb.push("NULL"),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Activity, User};
    use uuid::Uuid;

    const USER_COLUMNS: &str =
        "id, first_name, last_name, email, password, created_at, updated_at, deleted_at";

    #[test]
    fn test_select_scopes_on_soft_delete_table() {
        assert_eq!(
            Statement::<User>::select(Scope::Active).sql(),
            format!("SELECT {} FROM users WHERE deleted_at IS NULL", USER_COLUMNS)
        );
        assert_eq!(
            Statement::<User>::select(Scope::OnlyTrashed).sql(),
            format!("SELECT {} FROM users WHERE deleted_at IS NOT NULL", USER_COLUMNS)
        );
        assert_eq!(
            Statement::<User>::select(Scope::WithTrashed).sql(),
            format!("SELECT {} FROM users", USER_COLUMNS)
        );
    }

    #[test]
    fn test_select_without_soft_delete() {
        let stmt = Statement::<Activity>::select(Scope::Active);
        assert!(!stmt.sql().contains("WHERE"));
        assert!(stmt.sql().ends_with("FROM activities"));
    }

    #[test]
    fn test_filter_binds_values() {
        let filter = Filter::new()
            .eq("email", "ada@example.com")
            .gt("created_at", chrono::Utc::now())
            .like("last_name", "Love%");

        let mut stmt = Statement::<User>::select(Scope::Active);
        stmt.filter(&filter).unwrap();

        assert!(stmt.sql().ends_with(
            "WHERE deleted_at IS NULL AND email = $1 AND created_at > $2 AND last_name LIKE $3"
        ));
    }

    #[test]
    fn test_filter_null_values_render_is_null() {
        let filter = Filter::new()
            .eq("deleted_at", None::<Uuid>)
            .ne("first_name", Value::Null)
            .is_null("last_name");

        let mut stmt = Statement::<User>::select(Scope::WithTrashed);
        stmt.filter(&filter).unwrap();

        assert!(stmt.sql().ends_with(
            "WHERE deleted_at IS NULL AND first_name IS NOT NULL AND last_name IS NULL"
        ));
    }

    #[test]
    fn test_filter_from_pairs() {
        let filter: Filter = vec![("first_name", "Ada"), ("last_name", "Lovelace")]
            .into_iter()
            .collect();

        assert_eq!(filter.conditions().len(), 2);
        assert!(filter.conditions().iter().all(|c| c.op == Operator::Eq));
    }

    #[test]
    fn test_filter_rejects_unknown_column() {
        let mut stmt = Statement::<User>::select(Scope::Active);
        let err = stmt
            .filter(&Filter::new().eq("password", "x"))
            .err()
            .expect("password is not filterable");

        assert!(matches!(
            err,
            RepositoryError::ColumnNotAllowed {
                purpose: ColumnPurpose::Filter,
                ..
            }
        ));

        let mut stmt = Statement::<User>::select(Scope::Active);
        assert!(stmt
            .filter(&Filter::new().eq("email; DROP TABLE users", "x"))
            .is_err());
    }

    #[test]
    fn test_id_eq_and_returning() {
        let mut stmt = Statement::<User>::select(Scope::Active);
        stmt.id_eq(Uuid::new_v4()).push(" FOR UPDATE");

        assert!(stmt
            .sql()
            .ends_with("WHERE deleted_at IS NULL AND id = $1 FOR UPDATE"));
    }

    #[test]
    fn test_between_and_in_lists() {
        let mut stmt = Statement::<Activity>::select(Scope::Active);
        stmt.between("status", 200.into(), 299.into())
            .unwrap()
            .in_list("method", vec!["GET".into(), "POST".into()], false)
            .unwrap()
            .in_list("path", vec!["/health".into()], true)
            .unwrap();

        assert!(stmt.sql().ends_with(
            "WHERE status BETWEEN $1 AND $2 AND method IN ($3, $4) AND path NOT IN ($5)"
        ));
    }

    #[test]
    fn test_empty_in_lists() {
        let mut stmt = Statement::<Activity>::select(Scope::Active);
        stmt.in_list("status", vec![], false).unwrap();
        assert!(stmt.sql().ends_with("WHERE FALSE"));

        let mut stmt = Statement::<Activity>::select(Scope::Active);
        stmt.in_list("status", vec![], true).unwrap();
        assert!(stmt.sql().ends_with("WHERE TRUE"));
    }

    #[test]
    fn test_search_uses_searchable_columns() {
        let mut stmt = Statement::<User>::select(Scope::Active);
        stmt.search("email", "example").unwrap();
        assert!(stmt.sql().ends_with("AND email LIKE $1"));

        let mut stmt = Statement::<User>::select(Scope::Active);
        assert!(matches!(
            stmt.search("id", "1").err(),
            Some(RepositoryError::ColumnNotAllowed {
                purpose: ColumnPurpose::Search,
                ..
            })
        ));
    }

    #[test]
    fn test_order_by_multiple() {
        let mut stmt = Statement::<User>::select(Scope::Active);
        stmt.order_by(&[OrderBy::asc("last_name"), OrderBy::desc("created_at")])
            .unwrap()
            .limit_offset(10, 20);

        assert!(stmt
            .sql()
            .ends_with("ORDER BY last_name ASC, created_at DESC LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn test_order_by_rejects_unsortable_column() {
        let mut stmt = Statement::<User>::select(Scope::Active);
        assert!(stmt.order_by(&[OrderBy::asc("password")]).is_err());
    }

    #[test]
    fn test_aggregate_sql() {
        let stmt = Statement::<Activity>::aggregate(Aggregate::Avg, "status").unwrap();
        assert_eq!(
            stmt.sql(),
            "SELECT COALESCE(CAST(AVG(status) AS DOUBLE PRECISION), 0) FROM activities"
        );

        assert!(Statement::<Activity>::aggregate(Aggregate::Sum, "path").is_err());
        assert!(Statement::<User>::aggregate(Aggregate::Max, "created_at").is_err());
    }

    #[test]
    fn test_count_sql() {
        let mut stmt = Statement::<User>::count(Scope::Active);
        stmt.filter(&Filter::new().eq("last_name", "Lovelace")).unwrap();

        assert_eq!(
            stmt.sql(),
            "SELECT COUNT(*) FROM users WHERE deleted_at IS NULL AND last_name = $1"
        );
    }

    #[test]
    fn test_update_sql() {
        let mut stmt = Statement::<User>::update(
            vec![("first_name", "Ada".into()), ("last_name", "King".into())],
            User::WRITABLE,
        )
        .unwrap();
        stmt.scope(Scope::Active).id_eq(Uuid::new_v4());

        assert_eq!(
            stmt.sql(),
            "UPDATE users SET first_name = $1, last_name = $2 WHERE deleted_at IS NULL AND id = $3"
        );
    }

    #[test]
    fn test_update_rejects_unwritable_column() {
        let err = Statement::<User>::update(vec![("password", "plain".into())], User::WRITABLE)
            .err()
            .expect("password must not be writable column-wise");

        assert!(matches!(
            err,
            RepositoryError::ColumnNotAllowed {
                purpose: ColumnPurpose::Write,
                ..
            }
        ));
        assert!(Statement::<User>::update(Vec::<(&str, Value)>::new(), User::WRITABLE).is_err());
    }

    #[test]
    fn test_soft_delete_and_restore_sql() {
        let mut stmt = Statement::<User>::set_deleted(true).unwrap();
        stmt.scope(Scope::Active).id_eq(Uuid::new_v4());
        assert_eq!(
            stmt.sql(),
            "UPDATE users SET deleted_at = NOW() WHERE deleted_at IS NULL AND id = $1"
        );

        let mut stmt = Statement::<User>::set_deleted(false).unwrap();
        stmt.scope(Scope::OnlyTrashed).id_eq(Uuid::new_v4());
        assert_eq!(
            stmt.sql(),
            "UPDATE users SET deleted_at = NULL WHERE deleted_at IS NOT NULL AND id = $1"
        );

        assert!(matches!(
            Statement::<Activity>::set_deleted(true).err(),
            Some(RepositoryError::SoftDeleteUnsupported { table: "activities" })
        ));
    }

    #[test]
    fn test_insert_multiple_rows() {
        let rows = vec![
            Activity::request(None, "/a", "GET", "", "", "", 200).to_row(),
            Activity::request(None, "/b", "GET", "", "", "", 404).to_row(),
        ];
        let mut stmt = Statement::<Activity>::insert(rows).unwrap();
        stmt.returning();

        let sql = stmt.sql();
        assert!(sql.starts_with(
            "INSERT INTO activities (user_id, action, path, method, ip, user_agent, request, status, created_at) VALUES "
        ));
        // user_id is NULL literal, so eight binds per row
        assert!(sql.contains("(NULL, $1, $2, $3, $4, $5, $6, $7, $8), (NULL, $9,"));
        assert!(sql.ends_with("RETURNING id, user_id, action, path, method, ip, user_agent, request, status, created_at"));

        assert!(Statement::<Activity>::insert(vec![]).is_err());
    }

    #[test]
    fn test_upsert_sql() {
        let mut user = User::new("Ada", "Lovelace", "ada@example.com", "secret1");
        user.id = Uuid::new_v4();
        let mut stmt = Statement::<User>::insert(vec![user.to_row()]).unwrap();
        stmt.on_conflict_update(&["email"], &["first_name", "last_name", "email", "password"])
            .unwrap();

        assert!(stmt.sql().ends_with(
            "ON CONFLICT (email) DO UPDATE SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name, password = EXCLUDED.password"
        ));

        let mut stmt = Statement::<User>::insert(vec![user.to_row()]).unwrap();
        assert!(stmt.on_conflict_update(&["nickname"], &["email"]).is_err());
        assert!(stmt.on_conflict_update(&[], &["email"]).is_err());
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!("ASC".parse::<Direction>().unwrap(), Direction::Asc);
        assert_eq!("desc".parse::<Direction>().unwrap(), Direction::Desc);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_page_serializes_as_envelope() {
        let page = Page {
            total: 15,
            data: vec![1, 2, 3],
        };

        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            serde_json::json!({ "total": 15, "data": [1, 2, 3] })
        );
    }
}
