//! LLM provider abstraction.
//!
//! The service only needs chat completions, so the trait surface is a
//! single `chat()` over [`Message`]s plus model/name accessors. The one
//! production implementation is [`OpenAiProvider`], which also covers
//! SambaNova and any other OpenAI-compatible endpoint via
//! `OPENAI_API_BASE`.

pub mod openai;

use async_trait::async_trait;

use crate::error::{MediError, Result};
use crate::session::Message;

pub use openai::OpenAiProvider;

/// Sampling options for a chat call.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for ChatOptions {
    /// Conservative sampling; medical content wants low temperature.
    fn default() -> Self {
        Self {
            temperature: Some(0.3),
            top_p: None,
            max_tokens: Some(1000),
        }
    }
}

impl ChatOptions {
    /// Near-deterministic sampling for structured-JSON extraction calls.
    pub fn extraction() -> Self {
        Self {
            temperature: Some(0.1),
            top_p: Some(0.1),
            max_tokens: Some(1000),
        }
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A completed chat call.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub usage: Option<Usage>,
}

impl ChatReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one chat completion. `model = None` uses the provider default.
    async fn chat(
        &self,
        messages: Vec<Message>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<ChatReply>;

    /// Model used when a call does not specify one.
    fn default_model(&self) -> &str;

    /// Short provider identifier for logs.
    fn name(&self) -> &str;
}

/// Map an upstream HTTP error status to the service error taxonomy.
pub fn parse_provider_error(status: u16, message: &str) -> MediError {
    match status {
        401 | 403 => MediError::Unauthorized(message.to_string()),
        429 => MediError::QuotaExceeded(message.to_string()),
        _ => MediError::Provider(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_totals() {
        let usage = Usage::new(10, 5);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn test_chat_reply_builder() {
        let reply = ChatReply::text("hi").with_usage(Usage::new(1, 2));
        assert_eq!(reply.content, "hi");
        assert_eq!(reply.usage.unwrap().total_tokens, 3);
    }

    #[test]
    fn test_parse_provider_error_unauthorized() {
        assert!(matches!(
            parse_provider_error(401, "bad key"),
            MediError::Unauthorized(_)
        ));
        assert!(matches!(
            parse_provider_error(403, "forbidden"),
            MediError::Unauthorized(_)
        ));
    }

    #[test]
    fn test_parse_provider_error_quota() {
        assert!(matches!(
            parse_provider_error(429, "slow down"),
            MediError::QuotaExceeded(_)
        ));
    }

    #[test]
    fn test_parse_provider_error_generic() {
        assert!(matches!(
            parse_provider_error(500, "boom"),
            MediError::Provider(_)
        ));
    }

    #[test]
    fn test_default_options_bounded() {
        let opts = ChatOptions::default();
        assert_eq!(opts.temperature, Some(0.3));
        assert_eq!(opts.max_tokens, Some(1000));
    }

    #[test]
    fn test_extraction_options_near_deterministic() {
        let opts = ChatOptions::extraction();
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.top_p, Some(0.1));
    }
}
