//! Response cache in front of the agent pipeline.
//!
//! Answers are keyed by a deterministic hash of the responder model and
//! the normalized query text, so trivially reformatted repeats of the
//! same question are served from the cache without touching the provider.
//! Requests the key cannot fully describe (an attached prescription
//! image, or a conversation with prior turns) bypass the cache: a cached
//! answer must never depend on context the key does not capture.
//!
//! Cache failures are never fatal. A read error degrades to a miss and a
//! write error only loses the entry; the caller still gets a fresh answer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agents::{AgentContext, Intent, Orchestrator};
use crate::cache::{answer_key, Cache};
use crate::error::Result;

/// Wire form of one cached answer.
#[derive(Debug, Serialize, Deserialize)]
struct CachedAnswer {
    answer: String,
    intent: Intent,
}

/// What the gateway hands back to the HTTP layer.
#[derive(Debug)]
pub struct GatewayOutcome {
    pub answer: String,
    pub intent: Intent,
    /// True when the answer was served from the cache.
    pub cached: bool,
}

pub struct Gateway {
    cache: Arc<dyn Cache>,
    orchestrator: Orchestrator,
    /// Model name folded into the answer key; a model swap must not serve
    /// answers produced by its predecessor.
    key_model: String,
    ttl_secs: u64,
}

impl Gateway {
    pub fn new(
        cache: Arc<dyn Cache>,
        orchestrator: Orchestrator,
        key_model: impl Into<String>,
        ttl_secs: u64,
    ) -> Self {
        Self {
            cache,
            orchestrator,
            key_model: key_model.into(),
            ttl_secs,
        }
    }

    /// Answer one request, consulting the cache when the request is
    /// cacheable.
    pub async fn answer(&self, ctx: &AgentContext) -> Result<GatewayOutcome> {
        if !cacheable(ctx) {
            debug!("Request carries context beyond the query text, bypassing cache");
            let outcome = self.orchestrator.run(ctx).await?;
            return Ok(GatewayOutcome {
                answer: outcome.answer,
                intent: outcome.intent,
                cached: false,
            });
        }

        let key = answer_key(&self.key_model, &ctx.query);
        if let Some(hit) = self.lookup(&key).await {
            debug!(%key, "Answer cache hit");
            return Ok(GatewayOutcome {
                answer: hit.answer,
                intent: hit.intent,
                cached: true,
            });
        }

        debug!(%key, "Answer cache miss");
        let outcome = self.orchestrator.run(ctx).await?;
        self.store(&key, &outcome.answer, outcome.intent).await;
        Ok(GatewayOutcome {
            answer: outcome.answer,
            intent: outcome.intent,
            cached: false,
        })
    }

    /// Cache read with miss-on-error semantics.
    async fn lookup(&self, key: &str) -> Option<CachedAnswer> {
        let raw = match self.cache.get(key).await {
            Ok(v) => v?,
            Err(err) => {
                warn!(%key, error = %err, "Cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(hit) => Some(hit),
            Err(err) => {
                warn!(%key, error = %err, "Cached answer was unreadable, treating as miss");
                None
            }
        }
    }

    /// Cache write; failure only loses the entry.
    async fn store(&self, key: &str, answer: &str, intent: Intent) {
        let entry = CachedAnswer {
            answer: answer.to_string(),
            intent,
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%key, error = %err, "Could not serialize answer for caching");
                return;
            }
        };
        if let Err(err) = self.cache.set_ex(key, &raw, self.ttl_secs).await {
            warn!(%key, error = %err, "Cache write failed, answer not stored");
        }
    }
}

/// Whether the answer can be keyed by query text alone.
fn cacheable(ctx: &AgentContext) -> bool {
    ctx.image.is_none() && ctx.history.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testutil::ScriptedProvider;
    use crate::agents::AgentModels;
    use crate::cache::{MemoryCache, MockCache};
    use crate::error::MediError;
    use crate::session::Message;

    fn models() -> AgentModels {
        AgentModels {
            intent: "m-intent".into(),
            disease: "m-disease".into(),
            drug_extractor: "m-extract".into(),
            drug_info: "m-info".into(),
            responder: "m-respond".into(),
        }
    }

    const SMALL_TALK_TAG: &str = r#"{"response": "", "actual_tag": "small_talk"}"#;

    fn small_talk_provider(runs: usize) -> Arc<ScriptedProvider> {
        // Each pipeline run costs two calls: intent + responder.
        let mut replies = Vec::new();
        for _ in 0..runs {
            replies.push(SMALL_TALK_TAG);
            replies.push("Hello!");
        }
        Arc::new(ScriptedProvider::new(&replies))
    }

    fn gateway(provider: Arc<ScriptedProvider>, cache: Arc<dyn Cache>) -> Gateway {
        let orchestrator = Orchestrator::new(provider, models());
        Gateway::new(cache, orchestrator, "m-respond", 3600)
    }

    #[tokio::test]
    async fn test_repeat_query_inside_ttl_runs_pipeline_once() {
        let provider = small_talk_provider(1);
        let gw = gateway(provider.clone(), Arc::new(MemoryCache::ephemeral()));

        let first = gw.answer(&AgentContext::from_query("hello")).await.unwrap();
        assert!(!first.cached);
        let second = gw.answer(&AgentContext::from_query("hello")).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.answer, first.answer);
        assert_eq!(second.intent, first.intent);
        // One pipeline run total; the scripted reply stack would underflow
        // on a second run.
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_equivalent_spellings_share_one_entry() {
        let provider = small_talk_provider(1);
        let gw = gateway(provider.clone(), Arc::new(MemoryCache::ephemeral()));

        gw.answer(&AgentContext::from_query("What causes headaches?"))
            .await
            .unwrap();
        let repeat = gw
            .answer(&AgentContext::from_query("  what   causes headaches?  "))
            .await
            .unwrap();
        assert!(repeat.cached);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_runs_fresh_pipeline() {
        let provider = small_talk_provider(2);
        let cache = Arc::new(MemoryCache::ephemeral());
        let gw = {
            let orchestrator = Orchestrator::new(provider.clone(), models());
            Gateway::new(cache.clone(), orchestrator, "m-respond", 0)
        };

        gw.answer(&AgentContext::from_query("hello")).await.unwrap();
        // ttl_secs = 0 expires the entry immediately.
        let second = gw.answer(&AgentContext::from_query("hello")).await.unwrap();
        assert!(!second.cached);
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn test_image_request_bypasses_cache() {
        let mut cache = MockCache::new();
        cache.expect_get().never();
        cache.expect_set_ex().never();

        let provider = small_talk_provider(1);
        let gw = gateway(provider, Arc::new(cache));
        let mut ctx = AgentContext::from_query("what is this prescription");
        ctx.image = Some("data:image/png;base64,QUJD".into());
        let outcome = gw.answer(&ctx).await.unwrap();
        assert!(!outcome.cached);
    }

    #[tokio::test]
    async fn test_conversation_with_history_bypasses_cache() {
        let mut cache = MockCache::new();
        cache.expect_get().never();
        cache.expect_set_ex().never();

        let provider = small_talk_provider(1);
        let gw = gateway(provider, Arc::new(cache));
        let mut ctx = AgentContext::from_query("and for children?");
        ctx.history = vec![
            Message::user("what is the adult ibuprofen dose"),
            Message::assistant("For adults, typically..."),
        ];
        let outcome = gw.answer(&ctx).await.unwrap();
        assert!(!outcome.cached);
    }

    #[tokio::test]
    async fn test_cache_read_failure_degrades_to_miss() {
        let mut cache = MockCache::new();
        cache
            .expect_get()
            .returning(|_| Err(MediError::Cache("connection reset".into())));
        cache.expect_set_ex().returning(|_, _, _| Ok(()));

        let provider = small_talk_provider(1);
        let gw = gateway(provider.clone(), Arc::new(cache));
        let outcome = gw.answer(&AgentContext::from_query("hello")).await.unwrap();
        assert!(!outcome.cached);
        assert_eq!(outcome.answer, "Hello!");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_returns_answer() {
        let mut cache = MockCache::new();
        cache.expect_get().returning(|_| Ok(None));
        cache
            .expect_set_ex()
            .returning(|_, _, _| Err(MediError::Cache("oom".into())));

        let provider = small_talk_provider(1);
        let gw = gateway(provider, Arc::new(cache));
        let outcome = gw.answer(&AgentContext::from_query("hello")).await.unwrap();
        assert_eq!(outcome.answer, "Hello!");
    }

    #[tokio::test]
    async fn test_corrupt_cached_entry_degrades_to_miss() {
        let mut cache = MockCache::new();
        cache
            .expect_get()
            .returning(|_| Ok(Some("not json".to_string())));
        cache.expect_set_ex().returning(|_, _, _| Ok(()));

        let provider = small_talk_provider(1);
        let gw = gateway(provider, Arc::new(cache));
        let outcome = gw.answer(&AgentContext::from_query("hello")).await.unwrap();
        assert!(!outcome.cached);
        assert_eq!(outcome.answer, "Hello!");
    }

    #[tokio::test]
    async fn test_provider_failure_surfaces() {
        // Empty script: the first provider call errors.
        let provider = Arc::new(ScriptedProvider::new(&[]));
        let gw = gateway(provider, Arc::new(MemoryCache::ephemeral()));
        let result = gw.answer(&AgentContext::from_query("hello")).await;
        assert!(result.is_err());
    }
}
