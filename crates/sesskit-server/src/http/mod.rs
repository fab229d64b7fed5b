//! HTTP surface — one prefixed session per visitor, identified by a cookie.

pub mod cookie;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson, Response},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::config::SessionConfig;
use crate::maintenance;
use crate::types::{ErrorBody, ServerError, ServerResult};

/// Shared server state passed to all handlers via axum State.
pub struct ServerState {
    pub config: SessionConfig,
}

/// HTTP server exposing the session accessor.
pub struct HttpServer {
    state: Arc<ServerState>,
    cors: bool,
    gc_every: Option<Duration>,
}

impl HttpServer {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: Arc::new(ServerState { config }),
            cors: false,
            gc_every: None,
        }
    }

    /// Allow cross-origin requests from any origin.
    pub fn with_cors(mut self, cors: bool) -> Self {
        self.cors = cors;
        self
    }

    /// Sweep expired session files every `every` while serving.
    pub fn with_gc_interval(mut self, every: Option<Duration>) -> Self {
        self.gc_every = every.filter(|d| !d.is_zero());
        self
    }

    pub fn router(&self) -> Router {
        let app = router(self.state.clone());
        if self.cors {
            app.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        } else {
            app
        }
    }

    /// Run the HTTP server on the given address.
    pub async fn run(&self, addr: &str) -> ServerResult<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(ServerError::Io)?;

        tracing::info!("HTTP server listening on {addr}");

        let gc = self
            .gc_every
            .map(|every| maintenance::spawn(self.state.config.clone(), every));

        let served = axum::serve(listener, app).await;
        if let Some(gc) = gc {
            gc.abort();
        }
        served.map_err(|e| ServerError::Transport(e.to_string()))?;

        Ok(())
    }
}

/// Build the router over `state`.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(
            "/session",
            get(handlers::display)
                .post(handlers::set_many)
                .delete(handlers::destroy),
        )
        .route(
            "/session/:key",
            get(handlers::get_key)
                .put(handlers::set_key)
                .delete(handlers::forget_key),
        )
        .route("/session/:key/pull", post(handlers::pull_key))
        .route("/id", get(handlers::session_id))
        .route("/id/regenerate", post(handlers::regenerate))
        .route(
            "/flash/:name",
            get(handlers::message).post(handlers::set_flash),
        )
        .route("/health", get(handlers::health))
        .with_state(state)
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("Request failed: {self}");
        }
        (status, AxumJson(ErrorBody::new(self.kind(), self.to_string()))).into_response()
    }
}
