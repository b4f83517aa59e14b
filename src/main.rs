use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, core_config_from_env, router};

/// Main entry point for the DXG application
///
/// Loads the catalog, opens the session store and serves the REST API with its Swagger UI.
///
/// # Environment Variables
/// - `DXG_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `DXG_BROKER_URL`: base URL of the presigned-URL broker; unset means local-only
/// - `DXG_CACHE_DIR`: directory of the local session cache
/// - `DXG_CATALOG`: path or http(s) URL of the diagnosis catalog
/// - `DXG_SAVE_DEBOUNCE_MS`: quiet period before a scheduled save is written
/// - `DXG_UNDO_CAPACITY`: number of undo snapshots kept per session
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, catalog loading or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("dxg=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("DXG_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(core_config_from_env()?);
    tracing::info!(
        "++ Cache directory {}, broker {}",
        cfg.cache_dir().display(),
        cfg.broker_url().unwrap_or("(none, local-only)")
    );

    let state = AppState::from_config(cfg).await?;

    tracing::info!("++ Starting DXG REST on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
