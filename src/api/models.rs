//! Request and response bodies for the agent endpoint.

use serde::{Deserialize, Serialize};

use crate::error::MediError;

/// Body of `POST /api/v1/run`.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentRequest {
    pub query: String,
    /// Continues an existing conversation; a fresh id is minted when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Prescription image, raw base64 without a data-URI prefix.
    #[serde(default)]
    pub img_base64: Option<String>,
    /// Prescription image by URL, fetched server-side.
    #[serde(default)]
    pub img_url: Option<String>,
    /// Known drug names; skips the extraction stage when present.
    #[serde(default)]
    pub drugs: Option<Vec<String>>,
}

/// Body of every `POST /api/v1/run` response, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub response: String,
    pub session_id: String,
    /// True when the answer came from the response cache.
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub status_code: u16,
}

impl AgentResponse {
    pub fn ok(response: String, session_id: String, cached: bool) -> Self {
        Self {
            response,
            session_id,
            cached,
            error: None,
            status_code: 200,
        }
    }

    pub fn failure(status_code: u16, session_id: String, error: String) -> Self {
        Self {
            response: String::new(),
            session_id,
            cached: false,
            error: Some(error),
            status_code,
        }
    }
}

/// HTTP status for a pipeline or cache failure.
///
/// Upstream provider trouble is the service's fault from the caller's
/// perspective (502), except quota exhaustion which maps to 429 so
/// clients can back off.
pub fn error_status(err: &MediError) -> u16 {
    match err {
        MediError::Provider(_) | MediError::Unauthorized(_) => 502,
        MediError::QuotaExceeded(_) => 429,
        _ => 500,
    }
}
