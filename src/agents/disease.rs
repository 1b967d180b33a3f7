//! Disease and symptom analysis.
//!
//! Two provider calls: a strict-JSON symptom extraction, then an analysis
//! turning the structured symptoms into a technical draft for the
//! responder. Extraction failures fall back to analyzing the raw query so
//! a malformed JSON reply never loses the request.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::providers::{ChatOptions, ChatProvider};
use crate::session::Message;
use crate::utils::extract::extract_json_object;

/// Structured output of the symptom-extraction call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SymptomReport {
    #[serde(default)]
    pub extracted_symptoms: Vec<String>,
    #[serde(default)]
    pub severity: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub duration: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub additional_info: String,
}

const EXTRACTION_PROMPT: &str = r#"You are a medical assistant that extracts symptoms from patient descriptions.

Rules:
1. Extract symptoms in medical terminology when possible (e.g. "tummy ache" -> "abdominal pain", "runny nose" -> "rhinorrhea").
2. Include severity and duration only if mentioned.
3. Be conservative — only extract what is clearly stated.

Response format (MUST be valid JSON, nothing else):
{
    "extracted_symptoms": ["symptom1", "symptom2"],
    "severity": {"symptom1": "mild/moderate/severe"},
    "duration": {"symptom1": "hours/days/weeks"},
    "additional_info": "any other relevant context"
}"#;

const ANALYSIS_PROMPT: &str = r#"You are a clinical analysis assistant. Given a patient's reported
symptoms with severity and duration, provide a concise technical assessment:

1. The most likely explanations consistent with the reported symptoms.
2. Red flags that would warrant prompt professional evaluation.
3. Sensible monitoring and self-care measures.

Do not state a definitive diagnosis. Clearly mark uncertainty. Base the
assessment only on the information provided."#;

/// Extract a [`SymptomReport`] from free-text symptom descriptions.
pub async fn extract_symptoms(
    provider: &dyn ChatProvider,
    model: &str,
    query: &str,
) -> Result<Option<SymptomReport>> {
    let messages = vec![Message::system(EXTRACTION_PROMPT), Message::user(query)];
    let reply = provider
        .chat(messages, Some(model), ChatOptions::extraction())
        .await?;

    let report = extract_json_object(&reply.content)
        .and_then(|v| serde_json::from_value::<SymptomReport>(v).ok());
    if report.is_none() {
        warn!("Symptom extraction reply was not valid JSON, analyzing raw query");
    }
    Ok(report)
}

/// Render the extraction result as the analysis call's user prompt.
fn analysis_input(query: &str, report: Option<&SymptomReport>) -> String {
    match report {
        Some(report) if !report.extracted_symptoms.is_empty() => {
            let mut lines = vec!["Reported symptoms:".to_string()];
            for symptom in &report.extracted_symptoms {
                let severity = report.severity.get(symptom).map(String::as_str);
                let duration = report.duration.get(symptom).map(String::as_str);
                let detail = match (severity, duration) {
                    (Some(s), Some(d)) => format!(" (severity: {s}, duration: {d})"),
                    (Some(s), None) => format!(" (severity: {s})"),
                    (None, Some(d)) => format!(" (duration: {d})"),
                    (None, None) => String::new(),
                };
                lines.push(format!("- {symptom}{detail}"));
            }
            if !report.additional_info.is_empty() {
                lines.push(format!("Additional context: {}", report.additional_info));
            }
            lines.push(format!("Original description: {query}"));
            lines.join("\n")
        }
        _ => format!("Patient description (unstructured): {query}"),
    }
}

/// Full disease-agent run: extraction + analysis, returning the draft.
pub async fn analyze(provider: &dyn ChatProvider, model: &str, query: &str) -> Result<String> {
    let report = extract_symptoms(provider, model, query).await?;
    debug!(
        symptoms = report.as_ref().map(|r| r.extracted_symptoms.len()).unwrap_or(0),
        "Symptom extraction complete"
    );
    let messages = vec![
        Message::system(ANALYSIS_PROMPT),
        Message::user(analysis_input(query, report.as_ref())),
    ];
    let reply = provider
        .chat(messages, Some(model), ChatOptions::default())
        .await?;
    Ok(reply.content)
}
