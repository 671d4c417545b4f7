//! # HTTP Server
//!
//! Binds the table routes behind an open CORS policy and request tracing.

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::libs::config::ServerConfig;
use crate::libs::gateway::TableGateway;
use crate::libs::routes::table_routes;

pub struct HttpServer {
    config: ServerConfig,
    gateway: Arc<TableGateway>,
    router: Router,
}

impl HttpServer {
    pub fn new(config: ServerConfig, gateway: TableGateway) -> Self {
        let gateway = Arc::new(gateway);
        let router = Self::build_router(gateway.clone());
        Self {
            config,
            gateway,
            router,
        }
    }

    /// Routes plus middleware. Any origin may call any endpoint.
    pub fn build_router(gateway: Arc<TableGateway>) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        table_routes(gateway)
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until Ctrl-C, then close the connection pool.
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr).await?;

        info!("Table gateway listening on http://{}", listener.local_addr()?);
        if self.config.debug {
            info!("Debug mode on: generated SQL is logged");
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Shutting down, closing database connections");
        self.gateway.connections().close().await;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
