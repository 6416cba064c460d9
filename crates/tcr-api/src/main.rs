//! # tcr-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the Trade Certificate Registry.
//! Binds to a configurable port (default 8080).

use tcr_api::state::{AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Build configuration from environment.
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let auth_token = std::env::var("TCR_AUTH_TOKEN")
        .ok()
        .map(tcr_api::auth::SecretToken::new);
    let config = AppConfig { port, auth_token };

    let asset_config = tcr_assets::AssetConfig::from_env().map_err(|e| {
        tracing::error!("Asset configuration invalid: {e}");
        e
    })?;

    // Initialize database pool (optional — absent means in-memory only).
    let db_pool = tcr_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let state = AppState::build(config, asset_config, db_pool).map_err(|e| {
        tracing::error!("State assembly failed: {e}");
        e
    })?;

    // Hydrate the in-memory store from the database mirror (if connected),
    // then seed the built-in edition catalog on a blank deployment.
    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;
    state.seed_default_editions().await.map_err(|e| {
        tracing::error!("Edition seeding failed: {e}");
        e
    })?;

    let app = tcr_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("TCR API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
