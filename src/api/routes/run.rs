//! The agent endpoint.
//!
//! Resolves the session and any image payload, hands the request to the
//! cache gateway, and persists the turn into session state. Failures are
//! reported in-body with a matching HTTP status so callers always get the
//! same response shape.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use tracing::{error, info};

use crate::api::models::{error_status, AgentRequest, AgentResponse};
use crate::api::server::AppState;
use crate::agents::AgentContext;
use crate::error::Result;
use crate::session::{Message, SessionStore};
use crate::utils::extract::{
    data_uri_from_base64, fetch_image_as_data_uri, find_image_ref, read_image_as_data_uri,
    ImageRef,
};

/// POST /api/v1/run
pub async fn run_agent(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AgentRequest>,
) -> (StatusCode, Json<AgentResponse>) {
    if request.query.trim().is_empty() {
        let session_id = request.session_id.unwrap_or_default();
        return respond(AgentResponse::failure(
            422,
            session_id,
            "query must not be blank".into(),
        ));
    }

    let session_id = request
        .session_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(SessionStore::new_session_id);

    let image = match resolve_image(&request).await {
        Ok(image) => image,
        Err(err) => {
            error!(%session_id, error = %err, "Image resolution failed");
            return respond(AgentResponse::failure(
                422,
                session_id,
                format!("could not load image: {err}"),
            ));
        }
    };

    let ctx = AgentContext {
        query: request.query.clone(),
        history: state.sessions.history(&session_id).await,
        image,
        drugs: request.drugs.clone(),
    };

    match state.gateway.answer(&ctx).await {
        Ok(outcome) => {
            info!(
                %session_id,
                intent = outcome.intent.as_tag(),
                cached = outcome.cached,
                "Request answered"
            );
            record_turn(state.as_ref(), &session_id, &request, &outcome.answer).await;
            respond(AgentResponse::ok(outcome.answer, session_id, outcome.cached))
        }
        Err(err) => {
            error!(%session_id, error = %err, "Pipeline failed");
            respond(AgentResponse::failure(
                error_status(&err),
                session_id,
                err.to_string(),
            ))
        }
    }
}

fn respond(body: AgentResponse) -> (StatusCode, Json<AgentResponse>) {
    let status =
        StatusCode::from_u16(body.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body))
}

/// Resolve the request's image, if any, to a data URI.
///
/// Explicit fields win; otherwise the query text is scanned for an
/// embedded image reference.
async fn resolve_image(request: &AgentRequest) -> Result<Option<String>> {
    if let Some(b64) = &request.img_base64 {
        return Ok(Some(data_uri_from_base64(b64)));
    }
    if let Some(url) = &request.img_url {
        return Ok(Some(fetch_image_as_data_uri(url).await?));
    }
    match find_image_ref(&request.query) {
        Some(ImageRef::DataUri(uri)) => Ok(Some(uri)),
        Some(ImageRef::Url(url)) => Ok(Some(fetch_image_as_data_uri(&url).await?)),
        Some(ImageRef::Path(path)) => Ok(Some(read_image_as_data_uri(&path)?)),
        None => Ok(None),
    }
}

/// Persist the user and assistant turns. Session-store failures only cost
/// continuity, never the response.
async fn record_turn(state: &AppState, session_id: &str, request: &AgentRequest, answer: &str) {
    let turns = [Message::user(&request.query), Message::assistant(answer)];
    if let Err(err) = state.sessions.append(session_id, &turns).await {
        error!(%session_id, error = %err, "Failed to persist session turn");
    }
}
