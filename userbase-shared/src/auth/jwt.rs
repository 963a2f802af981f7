/// JWT issuing and validation
///
/// Tokens are HS256-signed and carry the user id as `sub`. All signing
/// material lives in a [`TokenIssuer`] built once at startup from explicit
/// configuration and shared through application state; there is no global
/// secret.
///
/// # Claims
///
/// - `sub`: user ID
/// - `iss`: configured issuer (default "userbase")
/// - `iat` / `nbf`: issue time
/// - `exp`: issue time plus the configured lifetime (default 24 hours)
///
/// # Example
///
/// ```
/// use userbase_shared::auth::jwt::TokenIssuer;
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let issuer = TokenIssuer::new("a-long-random-secret", "userbase", Duration::hours(24));
/// let user_id = Uuid::new_v4();
///
/// let token = issuer.issue(user_id)?;
/// let claims = issuer.validate(&token)?;
/// assert_eq!(claims.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default issuer claim
pub const DEFAULT_ISSUER: &str = "userbase";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Issuer claim does not match
    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - User ID
    pub sub: Uuid,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,
}

impl Claims {
    /// Creates claims for `user_id` expiring `expires_in` from now
    pub fn new(user_id: Uuid, issuer: impl Into<String>, expires_in: Duration) -> Self {
        let now = Utc::now();
        let expiration = now + expires_in;

        Self {
            sub: user_id,
            iss: issuer.into(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            nbf: now.timestamp(),
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Gets time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now().timestamp();
        if self.exp > now {
            Some(Duration::seconds(self.exp - now))
        } else {
            None
        }
    }
}

/// Signs and validates access tokens
///
/// Holds the precomputed HS256 keys, the expected issuer and the token
/// lifetime.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    lifetime: Duration,
}

impl TokenIssuer {
    /// Creates an issuer from a shared secret
    pub fn new(secret: &str, issuer: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            lifetime,
        }
    }

    /// Issuer claim written into and expected on every token
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Lifetime of newly issued tokens
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issues a token for `user_id` with the configured lifetime
    ///
    /// # Errors
    ///
    /// Returns `JwtError::CreateError` if encoding fails
    pub fn issue(&self, user_id: Uuid) -> Result<String, JwtError> {
        self.sign(&Claims::new(user_id, self.issuer.clone(), self.lifetime))
    }

    /// Signs arbitrary claims with this issuer's key
    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
    }

    /// Validates a token and returns its claims
    ///
    /// Verifies the signature, `exp`, `nbf` and `iss`.
    ///
    /// # Errors
    ///
    /// - `JwtError::Expired` when `exp` has passed
    /// - `JwtError::InvalidIssuer` when `iss` differs from this issuer
    /// - `JwtError::ValidationError` for bad signatures and malformed tokens
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        let token_data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
                    expected: self.issuer.clone(),
                },
                _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
            }
        })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, DEFAULT_ISSUER, Duration::hours(24))
    }

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, DEFAULT_ISSUER, Duration::hours(24));

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "userbase");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_claims_time_until_expiration() {
        let claims = Claims::new(Uuid::new_v4(), DEFAULT_ISSUER, Duration::hours(1));

        let time_left = claims.time_until_expiration().unwrap();
        assert!(time_left.num_seconds() > 3500);
        assert!(time_left.num_seconds() <= 3600);
    }

    #[test]
    fn test_issue_and_validate() {
        let issuer = issuer();
        let user_id = Uuid::new_v4();

        let token = issuer.issue(user_id).expect("Should create token");
        let claims = issuer.validate(&token).expect("Should validate token");

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "userbase");
        assert_eq!(claims.exp - claims.iat, issuer.lifetime().num_seconds());
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let token = issuer().issue(Uuid::new_v4()).unwrap();
        let other = TokenIssuer::new("another-secret", DEFAULT_ISSUER, Duration::hours(24));

        assert!(matches!(
            other.validate(&token),
            Err(JwtError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_wrong_issuer() {
        let token = issuer().issue(Uuid::new_v4()).unwrap();
        let other = TokenIssuer::new(SECRET, "someone-else", Duration::hours(24));

        assert!(matches!(
            other.validate(&token),
            Err(JwtError::InvalidIssuer { .. })
        ));
    }

    #[test]
    fn test_validate_expired_token() {
        let issuer = issuer();
        let claims = Claims::new(Uuid::new_v4(), DEFAULT_ISSUER, Duration::seconds(-3600));
        assert!(claims.is_expired());
        assert!(claims.time_until_expiration().is_none());

        let token = issuer.sign(&claims).unwrap();
        assert!(matches!(issuer.validate(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn test_validate_garbage() {
        assert!(issuer().validate("not-a-jwt").is_err());
        assert!(issuer().validate("").is_err());
    }
}
