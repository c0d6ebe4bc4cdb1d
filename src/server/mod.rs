//! HTTP front end for the processing pipeline.
//!
//! Exposes URL and upload analysis, health, and read-only access to the
//! review queue. Each analysis runs in its own task; when the client goes
//! away the request is cancelled before any further retry or storage write.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Settings;
use crate::services::DocumentProcessor;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<DocumentProcessor>,
}

impl AppState {
    pub fn new(processor: DocumentProcessor) -> Self {
        Self {
            processor: Arc::new(processor),
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self::new(DocumentProcessor::from_settings(settings)?))
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::from_settings(settings)?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
