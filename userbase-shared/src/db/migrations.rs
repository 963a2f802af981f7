/// Database migration runner
///
/// The schema lives in `migrations/` at the workspace root and is embedded
/// into the binary with `sqlx::migrate!`, so the `users` and `activities`
/// tables are created or brought up to date every time the server starts.
///
/// # Example
///
/// ```no_run
/// use userbase_shared::db::pool::{create_pool, DatabaseConfig};
/// use userbase_shared::db::migrations::{get_migration_status, run_migrations};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(&DatabaseConfig::default()).await?;
///
///     run_migrations(&pool).await?;
///
///     let status = get_migration_status(&pool).await?;
///     println!("Applied {} migrations", status.applied_migrations);
///     Ok(())
/// }
/// ```

use sqlx::{migrate::Migrator, postgres::PgPool};
use tracing::{debug, info, warn};

/// Embedded schema migrations
pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Number of migrations that have been applied
    pub applied_migrations: usize,

    /// Latest applied migration version
    pub latest_version: Option<i64>,

    /// Whether every embedded migration has been applied
    pub is_up_to_date: bool,
}

/// Runs all pending database migrations
///
/// # Errors
///
/// Returns an error if a migration fails to apply or a previously applied
/// migration no longer matches its embedded checksum
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Starting database migrations");

    match MIGRATOR.run(pool).await {
        Ok(()) => {
            info!("All database migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            warn!("Migration failed: {}", e);
            Err(e)
        }
    }
}

/// Gets the current migration status
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    debug!("Checking migration status");

    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = current_schema()
            AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("Migrations table does not exist yet");
        return Ok(status_from(0, None));
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT
            COUNT(*) as count,
            MAX(version) as latest_version
         FROM _sqlx_migrations
         WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    debug!(
        applied_migrations = count,
        latest_version = ?latest_version,
        "Migration status retrieved"
    );

    Ok(status_from(count as usize, latest_version))
}

fn status_from(applied_migrations: usize, latest_version: Option<i64>) -> MigrationStatus {
    let expected_latest = MIGRATOR.iter().map(|m| m.version).max();

    MigrationStatus {
        applied_migrations,
        latest_version,
        is_up_to_date: applied_migrations >= MIGRATOR.iter().count()
            && latest_version == expected_latest,
    }
}
