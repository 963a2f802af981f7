/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use userbase_api::{app::{build_router, AppState}, config::Config};
/// use userbase_shared::db::pool::create_pool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(&config.database).await?;
/// let state = AppState::new(pool, config);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::activity::record_activity,
    routes::{self, resource::resource_routes},
};
use axum::{
    extract::{FromRef, Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use userbase_shared::{
    auth::{jwt::TokenIssuer, middleware::authenticate},
    entity::{Activity, User},
    service::Service,
};

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Token issuer built from `config.jwt`
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, config: Config) -> Self {
        let tokens = Arc::new(config.jwt.token_issuer());

        Self {
            db,
            config: Arc::new(config),
            tokens,
        }
    }
}

/// Lets handlers extract `State<Service<E>>` for any entity
impl<E> FromRef<AppState> for Service<E> {
    fn from_ref(state: &AppState) -> Self {
        Service::from_pool(state.db.clone())
    }
}

impl FromRef<AppState> for Arc<TokenIssuer> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.tokens)
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                     # Health check (public)
/// └── /api/
///     ├── /auth/
///     │   ├── POST /login             # public
///     │   ├── POST /register          # public
///     │   └── GET  /me                # bearer
///     └── /users/                     # bearer
///         ├── GET    /                # paginated list
///         ├── POST   /
///         ├── GET    /trashed
///         ├── GET    /search
///         ├── GET    /:id
///         ├── PUT    /:id
///         ├── DELETE /:id             # soft delete
///         ├── POST   /:id/restore
///         └── DELETE /:id/force       # hard delete
/// ```
///
/// # Middleware Stack
///
/// Outermost first:
/// 1. Activity recording (every request, including unmatched paths)
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. JWT authentication (matched protected routes only)
pub fn build_router(state: AppState) -> Router {
    let jwt = from_fn_with_state(state.clone(), jwt_auth_layer);

    let auth_routes = Router::new()
        .route("/login", post(routes::auth::login))
        .route("/register", post(routes::auth::register))
        .merge(
            Router::new()
                .route("/me", get(routes::auth::me))
                .route_layer(jwt.clone()),
        );

    let user_routes = resource_routes::<User>().route_layer(jwt);

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes);

    let activities = Service::<Activity>::from_pool(state.db.clone());
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(from_fn_with_state(activities, record_activity))
        .with_state(state)
}

/// Permissive when the origin list contains `*`, otherwise an explicit list
fn cors_layer(config: &Config) -> CorsLayer {
    let origins = config.cors_origins();

    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// JWT authentication middleware layer
///
/// Validates the bearer token, then injects the AuthContext into the request
/// extensions for handlers and into the response extensions so the activity
/// layer can attribute the request.
async fn jwt_auth_layer(
    State(tokens): State<Arc<TokenIssuer>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate(req.headers(), &tokens)?;
    req.extensions_mut().insert(auth);

    let mut response = next.run(req).await;
    response.extensions_mut().insert(auth);

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use userbase_shared::db::pool::create_lazy_pool;

    fn test_config(cors_origins: &str) -> Config {
        let mut config = Config::load(|_| None).unwrap();
        config.app.cors_origins = cors_origins.to_string();
        config
    }

    #[tokio::test]
    async fn test_app_state_builds_issuer_from_config() {
        let config = test_config("*");
        let pool = create_lazy_pool(&config.database).unwrap();
        let state = AppState::new(pool, config);

        assert_eq!(state.tokens.issuer(), state.config.jwt.issuer);
        let _users: Service<User> = Service::from_ref(&state);
    }

    #[test]
    fn test_cors_layer_variants() {
        // both configurations must build without panicking
        let _ = cors_layer(&test_config("*"));
        let _ = cors_layer(&test_config("https://app.example,https://admin.example"));
    }
}
