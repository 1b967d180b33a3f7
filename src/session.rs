//! Chat messages and per-session conversation state.
//!
//! History is stored in the cache backend as JSON under `state:{session_id}`
//! with the same TTL as cached answers, so an idle conversation ages out
//! together with its answers. History failures are logged and never fail a
//! request.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::cache::{state_key, Cache};
use crate::error::Result;

/// Cap on stored messages per session; older entries are dropped so
/// prompts stay bounded.
const MAX_HISTORY_MESSAGES: usize = 20;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Base64 data URI of an attached image (prescription photo). Kept out
    /// of stored history; only the current request's message carries one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            image: None,
            timestamp: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            image: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            image: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// User message with an attached image data URI.
    pub fn user_with_image(content: impl Into<String>, image_data_uri: impl Into<String>) -> Self {
        Self {
            image: Some(image_data_uri.into()),
            ..Self::user(content)
        }
    }
}

/// Render history as the compact JSON the agent prompts interpolate.
pub fn history_as_json(messages: &[Message]) -> String {
    let turns: Vec<serde_json::Value> = messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                "content": m.content,
            })
        })
        .collect();
    serde_json::json!({ "messages": turns }).to_string()
}

/// Loads and appends per-session history in the cache backend.
#[derive(Clone)]
pub struct SessionStore {
    cache: Arc<dyn Cache>,
    ttl_secs: u64,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn Cache>, ttl_secs: u64) -> Self {
        Self { cache, ttl_secs }
    }

    /// Fresh session identifier.
    pub fn new_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Load a session's history. Missing or unreadable state yields an
    /// empty history rather than an error.
    pub async fn history(&self, session_id: &str) -> Vec<Message> {
        let key = state_key(session_id);
        let raw = match self.cache.get(&key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(session_id, error = %e, "Failed to load session history");
                return Vec::new();
            }
        };
        let Some(raw) = raw else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(session_id, error = %e, "Session history is corrupt, resetting");
                Vec::new()
            }
        }
    }

    /// Append turns to a session and refresh its TTL.
    ///
    /// Image payloads are stripped before storage. Only the newest
    /// [`MAX_HISTORY_MESSAGES`] turns are retained.
    pub async fn append(&self, session_id: &str, turns: &[Message]) -> Result<()> {
        let mut history = self.history(session_id).await;
        history.extend(turns.iter().cloned().map(|mut m| {
            m.image = None;
            m
        }));
        if history.len() > MAX_HISTORY_MESSAGES {
            history.drain(..history.len() - MAX_HISTORY_MESSAGES);
        }
        let raw = serde_json::to_string(&history)?;
        self.cache
            .set_ex(&state_key(session_id), &raw, self.ttl_secs)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(MemoryCache::ephemeral()), 3600)
    }

    #[test]
    fn test_message_constructors() {
        let m = Message::user("hello");
        assert_eq!(m.role, Role::User);
        assert!(m.timestamp.is_some());
        let s = Message::system("sys");
        assert!(s.timestamp.is_none());
    }

    #[test]
    fn test_user_with_image() {
        let m = Message::user_with_image("scan this", "data:image/png;base64,QUJD");
        assert_eq!(m.image.as_deref(), Some("data:image/png;base64,QUJD"));
    }

    #[test]
    fn test_history_as_json_shape() {
        let rendered = history_as_json(&[Message::user("hi"), Message::assistant("hello!")]);
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["messages"][0]["role"], "user");
        assert_eq!(parsed["messages"][1]["content"], "hello!");
    }

    #[tokio::test]
    async fn test_history_empty_for_new_session() {
        let store = store();
        assert!(store.history("nope").await.is_empty());
    }

    #[tokio::test]
    async fn test_append_then_history() {
        let store = store();
        store
            .append("s1", &[Message::user("q"), Message::assistant("a")])
            .await
            .unwrap();
        let history = store.history("s1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "q");
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_append_strips_images() {
        let store = store();
        store
            .append("s1", &[Message::user_with_image("q", "data:image/png;base64,AAAA")])
            .await
            .unwrap();
        let history = store.history("s1").await;
        assert!(history[0].image.is_none());
    }

    #[tokio::test]
    async fn test_history_bounded() {
        let store = store();
        for i in 0..30 {
            store
                .append("s1", &[Message::user(format!("turn {i}"))])
                .await
                .unwrap();
        }
        let history = store.history("s1").await;
        assert_eq!(history.len(), MAX_HISTORY_MESSAGES);
        assert_eq!(history.last().unwrap().content, "turn 29");
    }

    #[tokio::test]
    async fn test_corrupt_history_resets() {
        let cache = Arc::new(MemoryCache::ephemeral());
        cache
            .set_ex(&state_key("s1"), "%%garbage%%", 3600)
            .await
            .unwrap();
        let store = SessionStore::new(cache, 3600);
        assert!(store.history("s1").await.is_empty());
    }

    #[test]
    fn test_new_session_ids_unique() {
        assert_ne!(SessionStore::new_session_id(), SessionStore::new_session_id());
    }
}
