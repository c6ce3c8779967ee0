//! Keep-alive HTTP endpoint for hosting-platform health probes.
//!
//! Runs on its own OS thread with a private single-threaded runtime so a slow
//! inference call on the bot side never delays the probe.

use std::net::SocketAddr;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tracing::{error, info};

pub const ALIVE_BODY: &str = "Bot is alive!";

pub fn router() -> Router {
    Router::new().route("/", get(|| async { ALIVE_BODY }))
}

/// Serves the liveness route on an already-bound listener until the process exits.
pub async fn serve(listener: TcpListener) -> Result<()> {
    axum::serve(listener, router())
        .await
        .context("Liveness server error")
}

async fn bind_and_serve(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind liveness endpoint on {}", addr))?;
    info!("Liveness endpoint listening on http://{}", addr);
    serve(listener).await
}

/// Spawns the liveness server on a background thread.
pub fn spawn(port: u16) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("liveness".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to start liveness runtime: {}", e);
                    return;
                }
            };
            if let Err(e) = runtime.block_on(bind_and_serve(port)) {
                error!("{:#}", e);
            }
        })
        .context("Failed to spawn liveness thread")
}
