//! Drug and prescription analysis.
//!
//! Stage one extracts drug names from text or a prescription image with a
//! vision-capable model (skipped when the caller already supplied a drug
//! list). Stage two asks the drug-info model for a clinical analysis of
//! the named medications and their pairwise interaction risks.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::providers::{ChatOptions, ChatProvider};
use crate::session::Message;
use crate::utils::extract::extract_json_object;

use super::AgentContext;

/// Extraction entries below this confidence are dropped.
const MIN_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Default, Deserialize)]
struct ExtractionReply {
    #[serde(default)]
    drug_names: Vec<String>,
    #[serde(default)]
    confidence: Vec<f64>,
}

const EXTRACTOR_PROMPT: &str = r#"You are a medical AI assistant specialized in extracting drug names from text and images.

INSTRUCTIONS:
1. Extract ALL drug names: generic names (e.g. acetaminophen), brand names
   (e.g. Tylenol), prescription and over-the-counter medications.
2. DO NOT include general terms ("medication", "pills"), dosages ("500mg"),
   or medical conditions.
3. Return ONLY this JSON, no additional text:
{
    "drug_names": ["drug1", "drug2"],
    "confidence": [0.95, 0.87]
}
4. If no drug names are found, return {"drug_names": [], "confidence": []}.
5. Confidence is 0.0-1.0; below 0.6 means you are unsure the term is a drug."#;

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a helpful clinical assistant.";

/// Extract drug names from the query text or an attached prescription image.
///
/// Low-confidence entries are filtered out. An unparseable reply yields an
/// empty list rather than an error.
pub async fn extract_drug_names(
    provider: &dyn ChatProvider,
    model: &str,
    query: &str,
    image: Option<&str>,
) -> Result<Vec<String>> {
    let user = match image {
        Some(data_uri) => {
            Message::user_with_image("Extract the drug-names from the image", data_uri)
        }
        None => Message::user(query),
    };
    let reply = provider
        .chat(
            vec![Message::system(EXTRACTOR_PROMPT), user],
            Some(model),
            ChatOptions::extraction(),
        )
        .await?;

    let parsed = extract_json_object(&reply.content)
        .and_then(|v| serde_json::from_value::<ExtractionReply>(v).ok());
    let Some(parsed) = parsed else {
        warn!("Drug extraction reply was not valid JSON");
        return Ok(Vec::new());
    };

    let names = parsed
        .drug_names
        .into_iter()
        .enumerate()
        .filter(|(i, _)| {
            parsed
                .confidence
                .get(*i)
                .map(|c| *c >= MIN_CONFIDENCE)
                // No confidence reported for this entry — keep it.
                .unwrap_or(true)
        })
        .map(|(_, name)| name)
        .collect();
    Ok(names)
}

/// Build the clinical-analysis prompt for a list of drug names.
///
/// The upstream drug knowledge graph is out of scope here, so the model is
/// instructed to answer from its own knowledge and to flag uncertainty
/// instead of being handed verified interaction records.
fn analysis_prompt(drug_names: &[String]) -> String {
    format!(
        r#"# Clinical Drug Analysis

## Medications
{names}

## Instructions
1. **Summarize each drug** — indication, mechanism of action, and notable
   toxicity profile.
2. **Analyze combination risks** — list and explain known interaction
   risks for each pair of these medications, including food interactions.
3. **Clinical recommendations** — appropriate guidance for patients or
   clinicians based on the above.

Clearly flag anything you are not certain about, and recommend consulting
a pharmacist or physician for confirmation. Do not invent interactions."#,
        names = drug_names
            .iter()
            .enumerate()
            .map(|(i, n)| format!("{}. {n}", i + 1))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// Full drug-agent run, returning the technical draft.
pub async fn analyze(
    provider: &dyn ChatProvider,
    extractor_model: &str,
    info_model: &str,
    ctx: &AgentContext,
) -> Result<String> {
    let names = match &ctx.drugs {
        Some(list) if !list.is_empty() => list.clone(),
        _ => {
            extract_drug_names(provider, extractor_model, &ctx.query, ctx.image.as_deref()).await?
        }
    };
    debug!(drugs = names.len(), "Drug names resolved");

    if names.is_empty() {
        // Nothing to analyze; let the responder ask for specifics.
        return Ok(
            "No specific medication names could be identified in the request. \
             Ask the user to name the medications or share a clearer prescription."
                .to_string(),
        );
    }

    let messages = vec![
        Message::system(ANALYSIS_SYSTEM_PROMPT),
        Message::user(analysis_prompt(&names)),
    ];
    let reply = provider
        .chat(messages, Some(info_model), ChatOptions::default())
        .await?;
    Ok(reply.content)
}
