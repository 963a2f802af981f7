//! # Userbase API Server
//!
//! JSON REST backend for user accounts: registration, login with JWT bearer
//! tokens, and CRUD over users with soft delete. Every request is recorded in
//! the `activities` table.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p userbase-api
//! ```

use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use userbase_api::{
    app::{build_router, AppState},
    config::Config,
};
use userbase_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    init_tracing(config.is_production());

    tracing::info!(
        "Userbase API Server v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.app.env
    );

    if config.uses_default_secret_outside_development() {
        tracing::warn!("JWT_SECRET is not set; tokens are signed with the built-in development secret");
    }

    let pool = create_pool(&config.database).await?;
    run_migrations(&pool).await?;

    let addr = config.bind_address();
    let state = AppState::new(pool.clone(), config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Console output in development, JSON lines in production
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "userbase_api=debug,userbase_shared=debug,tower_http=debug".into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
