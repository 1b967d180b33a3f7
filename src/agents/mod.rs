//! LLM agent pipeline: intent classification, specialist analysis, and the
//! final empathetic responder.
//!
//! Flow (one request):
//!
//! ```text
//! query ──► intent classifier ──┬─► disease agent ──┐
//!                               ├─► drug agent ─────┼─► responder ──► answer
//!                               └─► (small talk) ───┘
//! ```
//!
//! Specialists produce a technical draft; the responder turns the draft,
//! the intent, and the chat history into the user-facing answer. Small
//! talk skips the specialists and goes straight to the responder with an
//! empty draft.

pub mod disease;
pub mod drugs;
pub mod intent;
pub mod responder;

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Settings;
use crate::error::Result;
use crate::providers::ChatProvider;
use crate::session::Message;

pub use intent::Intent;

/// Model assignment per pipeline stage.
#[derive(Debug, Clone)]
pub struct AgentModels {
    pub intent: String,
    pub disease: String,
    pub drug_extractor: String,
    pub drug_info: String,
    pub responder: String,
}

impl AgentModels {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            intent: settings.intent_model.clone(),
            disease: settings.disease_model.clone(),
            drug_extractor: settings.drug_extractor_model.clone(),
            drug_info: settings.drug_info_model.clone(),
            responder: settings.responder_model.clone(),
        }
    }
}

/// Everything one pipeline run needs from the request.
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    pub query: String,
    pub history: Vec<Message>,
    /// Prescription image as a data URI, when the request carries one.
    pub image: Option<String>,
    /// Caller-supplied drug list; skips the extraction call when present.
    pub drugs: Option<Vec<String>>,
}

impl AgentContext {
    pub fn from_query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// Result of a full pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub answer: String,
    pub intent: Intent,
}

/// Routes a query through intent → specialist → responder.
pub struct Orchestrator {
    provider: Arc<dyn ChatProvider>,
    models: AgentModels,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn ChatProvider>, models: AgentModels) -> Self {
        Self { provider, models }
    }

    /// Run the full pipeline for one request.
    pub async fn run(&self, ctx: &AgentContext) -> Result<PipelineOutcome> {
        let intent = intent::classify(
            self.provider.as_ref(),
            &self.models.intent,
            &ctx.query,
            &ctx.history,
        )
        .await?;
        info!(intent = intent.as_tag(), "Query classified");

        let draft = match intent {
            Intent::DiseaseAndSymptomAnalyzer => {
                disease::analyze(self.provider.as_ref(), &self.models.disease, &ctx.query).await?
            }
            Intent::DrugsAnalyser => {
                drugs::analyze(
                    self.provider.as_ref(),
                    &self.models.drug_extractor,
                    &self.models.drug_info,
                    ctx,
                )
                .await?
            }
            Intent::SmallTalk => String::new(),
        };
        debug!(draft_len = draft.len(), "Specialist draft ready");

        let answer = responder::respond(
            self.provider.as_ref(),
            &self.models.responder,
            &ctx.query,
            intent,
            &draft,
            &ctx.history,
        )
        .await?;

        Ok(PipelineOutcome { answer, intent })
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::ScriptedProvider;
    use super::*;

    fn models() -> AgentModels {
        AgentModels {
            intent: "m-intent".into(),
            disease: "m-disease".into(),
            drug_extractor: "m-extract".into(),
            drug_info: "m-drug".into(),
            responder: "m-responder".into(),
        }
    }

    #[tokio::test]
    async fn test_small_talk_uses_two_calls() {
        // intent + responder only, no specialist calls
        let provider = Arc::new(ScriptedProvider::new(&[
            r#"{"response": "hi!", "actual_tag": "small_talk"}"#,
            "Hello! How can I help you today?",
        ]));
        let orchestrator = Orchestrator::new(provider.clone(), models());
        let outcome = orchestrator
            .run(&AgentContext::from_query("hello there"))
            .await
            .unwrap();
        assert_eq!(outcome.intent, Intent::SmallTalk);
        assert_eq!(outcome.answer, "Hello! How can I help you today?");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_disease_route_runs_specialist() {
        // intent, symptom extraction, analysis, responder
        let provider = Arc::new(ScriptedProvider::new(&[
            r#"{"response": "", "actual_tag": "disease_and_symptom_analyzer"}"#,
            r#"{"extracted_symptoms": ["headache"], "severity": {"headache": "severe"}, "duration": {}, "additional_info": ""}"#,
            "Likely tension headache; monitor triggers.",
            "I understand headaches are distressing...",
        ]));
        let orchestrator = Orchestrator::new(provider.clone(), models());
        let outcome = orchestrator
            .run(&AgentContext::from_query("I have a bad headache"))
            .await
            .unwrap();
        assert_eq!(outcome.intent, Intent::DiseaseAndSymptomAnalyzer);
        assert_eq!(provider.call_count(), 4);
        assert!(outcome.answer.starts_with("I understand"));
    }

    #[tokio::test]
    async fn test_drug_route_with_caller_supplied_list_skips_extraction() {
        // intent, drug analysis (extraction skipped), responder
        let provider = Arc::new(ScriptedProvider::new(&[
            r#"{"response": "", "actual_tag": "drugs_analyser"}"#,
            "Aspirin and ibuprofen are both NSAIDs...",
            "Let me walk you through these medications...",
        ]));
        let orchestrator = Orchestrator::new(provider.clone(), models());
        let mut ctx = AgentContext::from_query("tell me about my meds");
        ctx.drugs = Some(vec!["Aspirin".into(), "Ibuprofen".into()]);
        let outcome = orchestrator.run(&ctx).await.unwrap();
        assert_eq!(outcome.intent, Intent::DrugsAnalyser);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_provider_failure_surfaces() {
        let provider = Arc::new(ScriptedProvider::new(&[]));
        let orchestrator = Orchestrator::new(provider, models());
        let result = orchestrator.run(&AgentContext::from_query("hi")).await;
        assert!(result.is_err());
    }
}
