//! # Userbase Shared Library
//!
//! Domain types and data access used by the Userbase API server.
//!
//! ## Module Organization
//!
//! - `entity`: Persisted record types and their column allow-lists
//! - `repository`: Generic query building and execution over entities
//! - `service`: Facade over repositories used by request handlers
//! - `auth`: Password hashing, JWT issuing and bearer authentication
//! - `db`: Connection pool and embedded migrations

pub mod auth;
pub mod db;
pub mod entity;
pub mod repository;
pub mod service;

/// Current version of the Userbase shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
