/// Password hashing with Argon2id
///
/// Every credential that reaches the `users.password` column passes through
/// [`hash_password`]. The stored value is a PHC string, so the algorithm,
/// parameters and salt travel with the hash and [`verify_password`] needs no
/// extra configuration.
///
/// # Parameters
///
/// - **Algorithm**: Argon2id, version 0x13
/// - **Memory**: 64 MiB (65536 KiB)
/// - **Iterations**: 3
/// - **Parallelism**: 4 lanes
/// - **Output**: 32 bytes
///
/// # Example
///
/// ```
/// use userbase_shared::auth::password::{hash_password, is_password_hash, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("hunter22")?;
/// assert!(is_password_hash(&hash));
/// assert!(verify_password("hunter22", &hash)?);
/// assert!(!verify_password("hunter23", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Stored value is not a PHC hash string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Hashes a plaintext password with Argon2id and a fresh random salt
///
/// Returns the PHC string, e.g.
/// ```text
/// $argon2id$v=19$m=65536,t=3,p=4$<salt>$<hash>
/// ```
///
/// # Errors
///
/// Returns `PasswordError::HashError` if the parameters are rejected or
/// hashing fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a plaintext password against a stored PHC hash
///
/// Returns `Ok(false)` on mismatch. Comparison is constant-time.
///
/// # Errors
///
/// Returns `PasswordError::InvalidHash` when `hash` cannot be parsed and
/// `PasswordError::VerifyError` for any other verifier failure.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    // Parameters are read from the PHC string
    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Returns true when `value` is an Argon2 PHC hash string
///
/// Used by the user lifecycle hooks to refuse persisting anything that is
/// not already hashed.
pub fn is_password_hash(value: &str) -> bool {
    PasswordHash::new(value)
        .map(|hash| hash.algorithm.as_str().starts_with("argon2"))
        .unwrap_or(false)
}
