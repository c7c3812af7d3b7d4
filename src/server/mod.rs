//! HTTP emulator of the vector search service.
//!
//! Serves an [`InMemoryService`] over the same `/v2/vectordb` REST surface the
//! client speaks, so a full lifecycle run needs no external database.

pub mod routes;

use crate::service::InMemoryService;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Shared application state for the HTTP server.
pub struct AppState {
    pub service: InMemoryService,
}

impl AppState {
    pub fn new(service: InMemoryService) -> Arc<Self> {
        Arc::new(Self { service })
    }
}

/// Bind `addr` and serve a fresh in-memory service until the process stops.
pub async fn start(addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", listener.local_addr()?);
    serve(listener, AppState::new(InMemoryService::with_endpoint(format!("http://{}", addr)))).await?;
    Ok(())
}

/// Serve `state` on an already bound listener.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    let app = routes::create_router(state);
    axum::serve(listener, app).await
}
