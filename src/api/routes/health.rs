//! Liveness and welcome endpoints.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::api::server::AppState;

/// GET /health — liveness probe.
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": state.api_version,
    }))
}

/// GET / — welcome banner.
pub async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": format!("Welcome to the {}", state.app_name),
        "version": state.api_version,
    }))
}
