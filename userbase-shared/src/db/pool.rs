/// Database connection pool management
///
/// Builds a PostgreSQL pool from discrete connection settings (host, port,
/// credentials, database name, SSL mode, session time zone) or from a full
/// connection URL when one is supplied.
///
/// # Example
///
/// ```no_run
/// use userbase_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         host: "localhost".to_string(),
///         name: "userbase".to_string(),
///         ..Default::default()
///     };
///
///     let pool = create_pool(&config).await?;
///     let row: (i64,) = sqlx::query_as("SELECT $1")
///         .bind(42i64)
///         .fetch_one(&pool)
///         .await?;
///     Ok(())
/// }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info, warn};

/// Configuration for the database connection pool
///
/// Timeouts are in seconds so they map directly onto environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Login role
    pub user: String,

    /// Login password
    pub password: String,

    /// Database name
    pub name: String,

    /// libpq-style SSL mode (`disable`, `prefer`, `require`, ...)
    pub sslmode: String,

    /// Session time zone applied to every connection
    pub timezone: String,

    /// Full connection URL; takes precedence over the discrete fields
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of idle connections to maintain
    pub min_connections: u32,

    /// Timeout for acquiring a connection from the pool (seconds)
    pub connect_timeout_seconds: u64,

    /// Idle time before a connection is closed (seconds)
    pub idle_timeout_seconds: Option<u64>,

    /// Maximum lifetime of a connection before it is recycled (seconds)
    pub max_lifetime_seconds: Option<u64>,

    /// Ping connections before handing them out
    pub test_before_acquire: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "secret".to_string(),
            name: "initial".to_string(),
            sslmode: "disable".to_string(),
            timezone: "Europe/Istanbul".to_string(),
            url: None,
            max_connections: 10,
            min_connections: 2,
            connect_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
            test_before_acquire: true,
        }
    }
}

impl DatabaseConfig {
    /// Builds connection options from this configuration
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is malformed or `sslmode` is not a known mode
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        let options = match &self.url {
            Some(url) if !url.is_empty() => PgConnectOptions::from_str(url)?,
            _ => PgConnectOptions::new()
                .host(&self.host)
                .port(self.port)
                .username(&self.user)
                .password(&self.password)
                .database(&self.name)
                .ssl_mode(PgSslMode::from_str(&self.sslmode)?),
        };

        Ok(options.options([("timezone", self.timezone.as_str())]))
    }

    fn pool_options(&self) -> PgPoolOptions {
        let mut pool_options = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.connect_timeout_seconds))
            .test_before_acquire(self.test_before_acquire);

        if let Some(idle_timeout) = self.idle_timeout_seconds {
            pool_options = pool_options.idle_timeout(Duration::from_secs(idle_timeout));
            debug!(idle_timeout_seconds = idle_timeout, "Set idle timeout");
        }

        if let Some(max_lifetime) = self.max_lifetime_seconds {
            pool_options = pool_options.max_lifetime(Duration::from_secs(max_lifetime));
            debug!(max_lifetime_seconds = max_lifetime, "Set max lifetime");
        }

        pool_options
    }
}

/// Creates a connection pool and verifies the database answers
///
/// # Errors
///
/// Returns an error if the options are invalid, the server is unreachable or
/// the health check fails
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    info!(
        host = %config.host,
        port = config.port,
        database = %config.name,
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Creating database connection pool"
    );

    let pool = config
        .pool_options()
        .connect_with(config.connect_options()?)
        .await?;

    health_check(&pool).await?;

    info!("Database connection pool created successfully");
    Ok(pool)
}

/// Creates a pool that opens connections on first use
///
/// No I/O happens here, which makes it suitable for tests that exercise code
/// paths ending before any query is sent.
pub fn create_lazy_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    Ok(config
        .pool_options()
        .min_connections(0)
        .connect_lazy_with(config.connect_options()?))
}

/// Performs a health check on the database connection
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    debug!("Performing database health check");

    let result: (i32,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;

    if result.0 == 1 {
        debug!("Database health check passed");
        Ok(())
    } else {
        warn!("Database health check returned unexpected value: {}", result.0);
        Err(sqlx::Error::Protocol(
            "Health check returned unexpected value".into(),
        ))
    }
}

/// Gracefully closes the connection pool
pub async fn close_pool(pool: PgPool) {
    info!("Closing database connection pool");
    pool.close().await;
    info!("Database connection pool closed");
}
