//! diced - dice rolling server
//!
//! A parameterized dice engine for tabletop RPG agents, served as JSON-RPC
//! tools over stdio or HTTP (SSE and plain request/response).

pub mod api;
pub mod config;
pub mod dice;
pub mod rpc;
pub mod service;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub use config::{Config, LogFormat};
use api::RateLimiter;
use rpc::RpcHandler;
use service::DiceService;

/// The diced HTTP server instance
pub struct Server {
    config: Config,
    handler: RpcHandler,
    limiter: Arc<RateLimiter>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        let handler = RpcHandler::new(Arc::new(DiceService::new(config.seed)));
        let limiter = Arc::new(RateLimiter::from_config(&config));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            handler,
            limiter,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Get the request handler
    pub fn handler(&self) -> &RpcHandler {
        &self.handler
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.handler.clone(), self.limiter.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("diced listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown_rx.changed().await.ok();
        })
        .await?;

        info!("diced shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
