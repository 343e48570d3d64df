//! Binary entrypoint for the flowdesk HTTP server.
//!
//! Configuration comes from `FLOWDESK_*` environment variables (see
//! [`ServerConfig::from_env`]); log filtering from `RUST_LOG`.

use tracing_subscriber::EnvFilter;

use flowdesk_server::config::ServerConfig;
use flowdesk_server::router::build_router;
use flowdesk_server::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let addr = format!("0.0.0.0:{}", config.port);
    let state = AppState::new(config)?;
    let app = build_router(state);

    tracing::info!("flowdesk server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
