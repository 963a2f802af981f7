/// Database layer
///
/// - `pool`: PostgreSQL connection pool built from discrete settings or a URL
/// - `migrations`: embedded schema migrations applied at startup
///
/// Query construction lives in [`crate::repository`].

pub mod migrations;
pub mod pool;
