//! HWID Key Server - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Initialize logging
//! 2. Load configuration from environment variables
//! 3. Open the key store: PostgreSQL (running migrations) when `DATABASE_URL`
//!    is set, otherwise the JSON document at `KEY_STORE_PATH`
//! 4. Build HTTP router with routes and middleware
//! 5. Serve until Ctrl-C / SIGTERM

use hwid_keyserver::{
    build_router,
    config::Config,
    db,
    middleware::auth::AdminAuth,
    services::key_service::KeyService,
    state::AppState,
    store::{FileKeyStore, KeyStore, PgKeyStore},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Reads RUST_LOG (defaults to "info")
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!("Configuration loaded");

    match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = db::create_pool(database_url, config.max_db_connections).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            serve(PgKeyStore::new(pool), &config).await
        }
        None => {
            let store = FileKeyStore::open(&config.key_store_path).await?;
            serve(store, &config).await
        }
    }
}

async fn serve<S: KeyStore>(store: S, config: &Config) -> anyhow::Result<()> {
    let admin_auth = AdminAuth::new(config.admin_token.as_deref());
    if !admin_auth.is_enabled() {
        tracing::warn!("ADMIN_TOKEN not set, key administration routes are unauthenticated");
    }

    let state = AppState::new(KeyService::new(store, config.key_prefix.clone()));
    let app = build_router(state, admin_auth);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}
