//! Intent classification for incoming health queries.
//!
//! One provider call with a strict-JSON system prompt; the reply's
//! `actual_tag` selects the downstream specialist. Unparseable or unknown
//! tags fall back to small talk, which asks the user for clarification
//! rather than running the wrong specialist.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::providers::{ChatOptions, ChatProvider};
use crate::session::{history_as_json, Message};
use crate::utils::extract::extract_json_object;

/// Which specialist should handle a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    DiseaseAndSymptomAnalyzer,
    DrugsAnalyser,
    SmallTalk,
}

impl Intent {
    /// Wire tag, as emitted by the classifier model.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Intent::DiseaseAndSymptomAnalyzer => "disease_and_symptom_analyzer",
            Intent::DrugsAnalyser => "drugs_analyser",
            Intent::SmallTalk => "small_talk",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "disease_and_symptom_analyzer" => Some(Intent::DiseaseAndSymptomAnalyzer),
            "drugs_analyser" => Some(Intent::DrugsAnalyser),
            "small_talk" => Some(Intent::SmallTalk),
            _ => None,
        }
    }
}

fn system_prompt(history: &[Message]) -> String {
    format!(
        r#"You are an intent classification agent for healthcare conversations.
Taking the CHAT_HISTORY into account, classify the user input into exactly
one of three tags.

## CHAT_HISTORY
{history}

## Tags
1. `disease_and_symptom_analyzer` — the user describes symptoms they are
   experiencing or asks about a medical condition (pain, fever, nausea,
   illness, symptom questions).
2. `drugs_analyser` — the user lists medications, uploads a prescription,
   or asks about drugs, dosages, side effects, or interactions.
3. `small_talk` — greetings and general conversation not related to
   health topics.

## Rules
- If the input mixes medical and non-medical content, prefer the medical tag.
- When uncertain, use `small_talk` and ask for clarification in the response.

## Output
Respond with valid JSON only, no additional text:
{{"response": "a short contextually appropriate reply", "actual_tag": "one_of_the_three_tags"}}"#,
        history = history_as_json(history),
    )
}

/// Classify one query, defaulting to [`Intent::SmallTalk`] when the model's
/// reply cannot be interpreted.
pub async fn classify(
    provider: &dyn ChatProvider,
    model: &str,
    query: &str,
    history: &[Message],
) -> Result<Intent> {
    let messages = vec![
        Message::system(system_prompt(history)),
        Message::user(format!("[USER] : {query}")),
    ];
    let reply = provider
        .chat(messages, Some(model), ChatOptions::extraction())
        .await?;

    let intent = extract_json_object(&reply.content)
        .and_then(|v| v["actual_tag"].as_str().and_then(Intent::from_tag));
    match intent {
        Some(intent) => Ok(intent),
        None => {
            warn!(
                reply = %reply.content.chars().take(120).collect::<String>(),
                "Unparseable intent reply, defaulting to small_talk"
            );
            Ok(Intent::SmallTalk)
        }
    }
}
