/// Configuration management for the API server
///
/// Configuration is layered with the `config` crate: built-in defaults, then
/// an optional `config/userbase.{toml,yaml,json}` file, then environment
/// variables. A `.env` file is loaded first when present.
///
/// # Environment Variables
///
/// - `APP_HOST`, `APP_PORT`, `APP_ENV`, `CORS_ORIGINS`
/// - `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASS`, `DB_NAME`, `DB_SSLMODE`,
///   `DB_TIMEZONE`, `DB_MAX_CONNECTIONS`
/// - `DATABASE_URL`: full connection string, wins over the `DB_*` parts
/// - `JWT_SECRET`, `JWT_ISSUER`, `JWT_EXPIRATION_HOURS`
/// - `RUST_LOG`: Log filter (default: debug for the userbase crates)
///
/// # Example
///
/// ```no_run
/// use userbase_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use chrono::Duration;
use serde::{Deserialize, Serialize};
use userbase_shared::{auth::jwt::TokenIssuer, db::pool::DatabaseConfig};

/// Signing secret used when none is configured
pub const DEFAULT_JWT_SECRET: &str = "super-secret-key";

/// Optional configuration file, without extension
const CONFIG_FILE: &str = "config/userbase";

/// Environment variable to configuration key
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("APP_HOST", "app.host"),
    ("APP_PORT", "app.port"),
    ("APP_ENV", "app.env"),
    ("CORS_ORIGINS", "app.cors_origins"),
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_USER", "database.user"),
    ("DB_PASS", "database.password"),
    ("DB_NAME", "database.name"),
    ("DB_SSLMODE", "database.sslmode"),
    ("DB_TIMEZONE", "database.timezone"),
    ("DATABASE_URL", "database.url"),
    ("DB_MAX_CONNECTIONS", "database.max_connections"),
    ("JWT_SECRET", "jwt.secret"),
    ("JWT_ISSUER", "jwt.issuer"),
    ("JWT_EXPIRATION_HOURS", "jwt.expiration_hours"),
];

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub app: AppConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Deployment environment (`development`, `production`, ...)
    pub env: String,

    /// Comma-separated allowed origins; `*` allows any
    pub cors_origins: String,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for HS256 signing
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// `iss` claim written and required on every token
    pub issuer: String,

    /// Token lifetime
    pub expiration_hours: i64,
}

impl JwtConfig {
    /// Builds the token issuer handed to the auth layer
    pub fn token_issuer(&self) -> TokenIssuer {
        TokenIssuer::new(
            &self.secret,
            self.issuer.clone(),
            Duration::hours(self.expiration_hours),
        )
    }
}

impl Config {
    /// Loads configuration from `.env`, the optional config file and the
    /// process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed into its field type or
    /// fails validation
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::load(|var| std::env::var(var).ok())
    }

    /// Loads configuration, reading environment overrides through `lookup`
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8080)?
            .set_default("app.env", "development")?
            .set_default("app.cors_origins", "*")?
            .set_default("jwt.secret", DEFAULT_JWT_SECRET)?
            .set_default("jwt.issuer", userbase_shared::auth::jwt::DEFAULT_ISSUER)?
            .set_default("jwt.expiration_hours", 24)?
            .add_source(config::File::with_name(CONFIG_FILE).required(false));

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, lookup(var))?;
        }

        let config: Config = builder.build()?.try_deserialize()?;

        if config.jwt.expiration_hours <= 0 {
            anyhow::bail!("JWT_EXPIRATION_HOURS must be positive");
        }

        Ok(config)
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }

    /// True when the built-in signing secret is in use outside development
    pub fn uses_default_secret_outside_development(&self) -> bool {
        self.jwt.secret == DEFAULT_JWT_SECRET && !self.is_development()
    }

    pub fn is_development(&self) -> bool {
        self.app.env.eq_ignore_ascii_case("development")
    }

    pub fn is_production(&self) -> bool {
        self.app.env.eq_ignore_ascii_case("production")
    }

    /// Allowed CORS origins, trimmed and without empty entries
    pub fn cors_origins(&self) -> Vec<String> {
        self.app
            .cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}
