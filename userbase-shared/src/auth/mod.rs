/// Authentication utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`jwt`]: token issuing and validation through an explicitly configured [`jwt::TokenIssuer`]
/// - [`middleware`]: bearer-token extraction and the per-request [`middleware::AuthContext`]
///
/// # Example
///
/// ```no_run
/// use userbase_shared::auth::{jwt::TokenIssuer, password::{hash_password, verify_password}};
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let issuer = TokenIssuer::new("secret-key", "userbase", Duration::hours(24));
/// let token = issuer.issue(Uuid::new_v4())?;
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod password;
