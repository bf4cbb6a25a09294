//! CholinEase Web Server
//!
//! Run with: cargo run -p cholinease-web --bin cholinease

use std::net::SocketAddr;

use anyhow::Context;
use cholinease_common::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cholinease=debug,info")),
        )
        .init();

    info!("Starting CholinEase web server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.server.bind))?;

    let state = cholinease_web::state::AppState::from_config(config).await;
    info!("Java check: {}", state.java_check.lines().next().unwrap_or_default());

    let app = cholinease_web::router::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
