//! HTTP backend for chat front-ends.
//!
//! | Route                   | Purpose                                   |
//! |-------------------------|-------------------------------------------|
//! | `POST /api/chat`        | Start a thread or continue one            |
//! | `GET /api/threads`      | List threads, most recent first           |
//! | `GET /api/threads/{id}` | Thread history, status and latest code    |
//! | `GET /health`           | Liveness                                  |

pub mod api;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use api::{AppState, SharedState};

use crate::workflow::Workflow;

pub struct ServerConfig {
    pub port: u16,
    /// Bind on all interfaces and allow any origin.
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9999,
            dev_mode: false,
        }
    }
}

pub fn build_router(state: SharedState) -> Router {
    api::api_router().with_state(state)
}

pub async fn start_server(config: ServerConfig, workflow: Workflow) -> Result<()> {
    let state = Arc::new(AppState::new(workflow));
    let mut app = build_router(state);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, dev_mode = config.dev_mode, "server listening");
    println!("frontsmith backend running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    println!("\nShutting down...");
}
