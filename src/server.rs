//! HTTP server setup

use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::commands::create_router;
use crate::config::Config;
use crate::db::Database;
use crate::services::state::AppState;

/// Router plus middleware for a prepared state.
pub fn build_app(state: AppState) -> Router {
    let enable_cors = state.config.enable_cors;
    let mut router = create_router(state).layer(TraceLayer::new_for_http());

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Opens the store, seeds defaults and serves until the process ends.
pub async fn run_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let db = Database::new(config.db_path.clone())?;
    let state = AppState::new(db, config);
    state.bootstrap()?;

    tracing::info!("Fundwise server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, build_app(state)).await?;

    Ok(())
}

/// Start server in background (for testing)
pub async fn start_background_server(state: AppState, addr: SocketAddr) -> Result<SocketAddr> {
    let router = build_app(state);

    // Bind to get actual address (useful when port is 0)
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
