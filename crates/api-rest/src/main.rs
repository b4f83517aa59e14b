//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging against a local cache directory. The workspace's main
//! `dxg-run` binary serves the same router.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{core_config_from_env, router, AppState};

/// Main entry point for the standalone REST API server
///
/// # Environment Variables
/// - `DXG_REST_ADDR`: listen address (default: "0.0.0.0:3000")
/// - `DXG_BROKER_URL`: presigned-URL broker; unset runs in local-only mode
/// - `DXG_CACHE_DIR`: local cache directory
/// - `DXG_CATALOG`: catalog file path or URL
/// - `DXG_SAVE_DEBOUNCE_MS`, `DXG_UNDO_CAPACITY`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("dxg_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("DXG_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(core_config_from_env()?);
    if cfg.broker_url().is_none() {
        tracing::warn!("DXG_BROKER_URL not set; sessions are kept in the local cache only");
    }
    let state = AppState::from_config(cfg).await?;

    tracing::info!("-- Starting DXG REST API on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
