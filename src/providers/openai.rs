//! OpenAI-compatible chat-completions provider.
//!
//! Talks to any endpoint implementing `POST {base}/chat/completions`
//! (OpenAI, SambaNova, vLLM, ...). The base URL and key come from
//! `OPENAI_API_BASE` / `OPENAI_API_KEY`. Image-bearing user messages are
//! sent as `image_url` content parts with a base64 data URI, which is how
//! prescription photos reach the drug-extraction model.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{MediError, Result};
use crate::session::{Message, Role};

use super::{parse_provider_error, ChatOptions, ChatProvider, ChatReply, Usage};

/// Upstream request timeout. Provider calls are the slow path of every
/// cache miss, so this bounds worst-case request latency.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// OpenAI-compatible chat provider.
pub struct OpenAiProvider {
    api_key: String,
    api_base: String,
    model: String,
    client: Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(api_key: &str, api_base: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| MediError::Provider(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Build the `/chat/completions` request body.
    ///
    /// Messages without an image use plain string content; an attached
    /// image becomes a two-part content array (text + `image_url`).
    fn build_request_body(&self, messages: &[Message], model: &str, options: &ChatOptions) -> Value {
        let rendered: Vec<Value> = messages
            .iter()
            .map(|m| match &m.image {
                Some(data_uri) => json!({
                    "role": Self::role_str(m.role),
                    "content": [
                        { "type": "text", "text": m.content },
                        { "type": "image_url", "image_url": { "url": data_uri } }
                    ]
                }),
                None => json!({
                    "role": Self::role_str(m.role),
                    "content": m.content,
                }),
            })
            .collect();

        let mut body = json!({
            "model": model,
            "messages": rendered,
        });
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(top_p) = options.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    /// Pull the assistant text out of a chat-completions response.
    fn extract_text(response: &Value) -> Option<String> {
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(String::from)
    }

    fn extract_usage(response: &Value) -> Option<Usage> {
        let usage = response.get("usage")?;
        let prompt = usage["prompt_tokens"].as_u64()? as u32;
        let completion = usage["completion_tokens"].as_u64()? as u32;
        Some(Usage::new(prompt, completion))
    }

    /// Pull a human-readable message out of an upstream error body.
    fn extract_error_message(body: &str) -> String {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(String::from))
            .unwrap_or_else(|| body.to_string())
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<ChatReply> {
        let model = model.unwrap_or(&self.model);
        let body = self.build_request_body(&messages, model, &options);

        debug!(model, messages = messages.len(), "Chat completion request");

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MediError::Provider(format!("request failed: {e}")))?;

        if response.status().is_success() {
            let json: Value = response
                .json()
                .await
                .map_err(|e| MediError::Provider(format!("failed to parse response: {e}")))?;
            let content = Self::extract_text(&json).ok_or_else(|| {
                MediError::Provider("response contained no message content".to_string())
            })?;
            let mut reply = ChatReply::text(content);
            if let Some(usage) = Self::extract_usage(&json) {
                reply = reply.with_usage(usage);
            }
            return Ok(reply);
        }

        let status = response.status().as_u16();
        let error_text = response.text().await.unwrap_or_default();
        let message = format!(
            "provider returned {status}: {}",
            Self::extract_error_message(&error_text)
        );
        Err(parse_provider_error(status, &message))
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}
