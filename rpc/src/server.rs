//! Axum router and server wiring.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use ballot_coordinator::{Coordinator, EventFeed};

use crate::error::RpcError;
use crate::handlers;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub feed: Arc<EventFeed>,
}

/// Build the full route table over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/vote", post(handlers::submit_vote))
        .route("/status", get(handlers::status))
        .route("/tally", get(handlers::tally))
        .route("/replicas", get(handlers::replicas))
        .route("/events", get(handlers::events))
        .route("/history", get(handlers::history))
        .route("/admin/session/start", post(handlers::start_session))
        .route("/admin/session/stop", post(handlers::stop_session))
        .route("/admin/session/publish", post(handlers::publish_results))
        .route("/admin/session/new", post(handlers::new_session))
        .with_state(state)
}

/// The HTTP server for the coordinator's public surface.
pub struct RpcServer {
    port: u16,
}

impl RpcServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Bind and serve until the shutdown future resolves.
    pub async fn start(
        &self,
        state: AppState,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RpcError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))?;
        tracing::info!(%addr, "rpc server listening");

        axum::serve(listener, router(state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}
