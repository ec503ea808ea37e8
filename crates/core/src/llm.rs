//! Language-model client for turning summary statistics into a narrative.

use crate::analysis::AnalysisReport;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Failures reported by the language-model service.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("model '{0}' not found")]
    ModelNotFound(String),
    #[error("language model service returned status {0}")]
    Api(u16),
    #[error("malformed language model response: {0}")]
    Response(String),
}

/// Produces narrative insights from prepared prompt sections.
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(
        &self,
        sections: &[String],
        model: &str,
        service_url: &str,
    ) -> Result<String, LlmError>;
}

const SYSTEM_PROMPT: &str = "You are a data analyst. Given the summary statistics, \
write 3-6 concise, actionable insights for a business audience.";

const INSTRUCTION: &str = "Using the information above, generate a short narrative \
with bullet points focusing on trends, anomalies, and recommendations. \
Keep it under 120 words";

/// Render the analysis report and optional context into ordered prompt
/// sections. Column maps are ordered, so the output is deterministic for
/// a given report.
pub fn craft_prompt(report: &AnalysisReport, context: &str) -> Vec<String> {
    let mut sections = Vec::new();

    if !report.numerical.is_empty() {
        let mut block = String::from("Preliminary insights of numerical columns:");
        for (name, summary) in &report.numerical {
            let std = summary
                .std
                .map(|v| format!("{v:.2}"))
                .unwrap_or_else(|| "n/a".to_string());
            block.push_str(&format!(
                "\n- {name}: count={}, mean={:.2}, std={std}, min={:.2}, p25={:.2}, p50={:.2}, p75={:.2}, max={:.2}",
                summary.count,
                summary.mean,
                summary.min,
                summary.p25,
                summary.p50,
                summary.p75,
                summary.max,
            ));
        }
        sections.push(block);
    }

    if !report.categorical.is_empty() {
        let mut block = String::from("Preliminary insights of categorical columns:");
        for (name, summary) in &report.categorical {
            block.push_str(&format!(
                "\n- {name}: count={}, unique={}, top={}, freq={}",
                summary.count,
                summary.unique,
                summary.top.as_deref().unwrap_or("n/a"),
                summary.freq,
            ));
        }
        sections.push(block);
    }

    if !context.is_empty() {
        sections.push(format!("Context: {context}"));
    }

    sections.push(INSTRUCTION.to_string());

    sections
}

/// Client for an Ollama-compatible chat endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InsightGenerator for OllamaClient {
    async fn generate(
        &self,
        sections: &[String],
        model: &str,
        service_url: &str,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", service_url.trim_end_matches('/'));

        let body = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": sections.join("\n\n") },
            ],
            "stream": false,
            "options": { "temperature": 0.2 },
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ServiceUnavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(LlmError::ModelNotFound(model.to_string())),
            status => return Err(LlmError::Api(status.as_u16())),
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Response(e.to_string()))?;

        tracing::debug!(model, chars = chat.message.content.len(), "llm response received");

        Ok(chat.message.content)
    }
}
