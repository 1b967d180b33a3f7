//! Axum server wiring.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::middleware as axum_mw;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::gateway::Gateway;
use crate::session::SessionStore;

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub api_version: String,
    /// Cache-fronted agent pipeline.
    pub gateway: Arc<Gateway>,
    /// Conversation state store.
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(
        app_name: impl Into<String>,
        api_version: impl Into<String>,
        gateway: Arc<Gateway>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            api_version: api_version.into(),
            gateway,
            sessions,
        }
    }
}

/// Build the axum router with all routes and layers.
pub fn build_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    // Any origin; the service carries no credentials or cookies.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(super::routes::health::root))
        .route("/health", get(super::routes::health::get_health))
        .route("/api/v1/run", post(super::routes::run::run_agent))
        // Body size limit: 1 MiB, enough for a base64 prescription photo.
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(axum_mw::from_fn(super::middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Start the API server.
pub async fn start_server(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");
    axum::serve(listener, app)
        .await
        .map_err(std::io::Error::from)?;
    Ok(())
}
