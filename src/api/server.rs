// src/api/server.rs

use crate::api::{create_router, AppState};
use log::info;
use std::future::Future;
use std::io;
use tokio::net::TcpListener;

pub struct ApiServer {
    port: u16,
    state: AppState,
}

impl ApiServer {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }

    /// Serves until `shutdown` resolves.
    pub async fn start<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.port)).await?;
        info!("🚀 Order API listening on port {}", self.port);
        info!("📡 Status updates at ws://0.0.0.0:{}/api/orders/updates/:id", self.port);

        axum::serve(listener, create_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
    }
}
