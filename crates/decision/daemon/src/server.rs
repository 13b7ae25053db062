//! Server setup and lifecycle management

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use decision_engine::DecisionEngine;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::bootstrap::build_engine;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};

/// decisiond server
pub struct Server {
    config: DaemonConfig,
    engine: Arc<DecisionEngine>,
}

impl Server {
    /// Build the engine and server. Must run inside a tokio runtime.
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let engine = Arc::new(build_engine(&config)?);
        Ok(Self { config, engine })
    }

    pub fn engine(&self) -> Arc<DecisionEngine> {
        Arc::clone(&self.engine)
    }

    /// Router with the HTTP middleware stack applied
    pub fn app(&self) -> Router {
        let server = &self.config.server;
        if server.operator_token.is_none() {
            tracing::warn!("No operator token configured; administrative routes are disabled");
        }

        let state = AppState::new(self.engine(), server.operator_token.as_deref());
        let mut app = create_router(state)
            .layer(DefaultBodyLimit::max(server.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(
                server.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http());

        if server.enable_cors {
            app = app.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }
        app
    }

    /// Run the server until a shutdown signal
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = self.app();

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, state = %self.engine.state(), "decisiond listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!(state = %self.engine.state(), "decisiond shutting down");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
