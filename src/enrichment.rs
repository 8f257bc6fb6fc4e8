//! Summary and keyword enrichment for test cases.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::{join_url, Auth, JsonEndpoint};

/// Summary plus keywords derived from a test case's text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    /// Short prose summary.
    #[serde(default)]
    pub summary: String,
    /// Search keywords in model order.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Trait implemented by enrichment backends.
pub trait EnrichmentClient {
    /// Derives a summary and keywords. Callers treat any error as "no enrichment".
    fn enrich(&self, description: &str, feature: &str, steps: &str) -> Result<EnrichmentResult>;
}

impl<T: EnrichmentClient + ?Sized> EnrichmentClient for Box<T> {
    fn enrich(&self, description: &str, feature: &str, steps: &str) -> Result<EnrichmentResult> {
        (**self).enrich(description, feature, steps)
    }
}

impl<T: EnrichmentClient + ?Sized> EnrichmentClient for &T {
    fn enrich(&self, description: &str, feature: &str, steps: &str) -> Result<EnrichmentResult> {
        (**self).enrich(description, feature, steps)
    }
}

/// Backend that never enriches; used when enrichment is switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnrichment;

impl EnrichmentClient for NoEnrichment {
    fn enrich(&self, _: &str, _: &str, _: &str) -> Result<EnrichmentResult> {
        Ok(EnrichmentResult::default())
    }
}

const SYSTEM_PROMPT: &str = "You summarize manual QA test cases for a search index. \
Reply with a single JSON object: {\"summary\": string, \"keywords\": [string]}. \
The summary is one or two sentences. Give 5 to 10 short keywords. No prose outside the JSON.";

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiEnricher {
    endpoint: JsonEndpoint,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl OpenAiEnricher {
    /// Builds a new enrichment client. `timeout` of `None` waits indefinitely.
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        temperature: f32,
        max_tokens: usize,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing OpenAI API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing enrichment model name");
        let endpoint = JsonEndpoint::new(
            "OpenAI chat completions",
            join_url(&base_url, "chat/completions"),
            Auth::Bearer(&api_key),
            timeout,
        )?;
        Ok(Self {
            endpoint,
            model,
            temperature,
            max_tokens,
        })
    }
}

impl EnrichmentClient for OpenAiEnricher {
    fn enrich(&self, description: &str, feature: &str, steps: &str) -> Result<EnrichmentResult> {
        let prompt = build_prompt(description, feature, steps);
        let reply: ChatResponse = self.endpoint.post(&ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        })?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("chat completion returned no choices"))?;
        parse_enrichment(&content)
    }
}

fn build_prompt(description: &str, feature: &str, steps: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("Feature:\n");
    prompt.push_str(feature.trim());
    prompt.push_str("\n\nDescription:\n");
    prompt.push_str(description.trim());
    prompt.push_str("\n\nSteps:\n");
    prompt.push_str(steps.trim());
    prompt.push('\n');
    prompt
}

/// Parses a model reply into an `EnrichmentResult`.
///
/// Accepts replies wrapped in code fences or surrounded by chatter, as long as a
/// JSON object is present. Missing fields default; non-string keywords are dropped.
pub fn parse_enrichment(reply: &str) -> Result<EnrichmentResult> {
    let start = reply
        .find('{')
        .ok_or_else(|| anyhow!("enrichment reply contains no JSON object"))?;
    let end = reply
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| anyhow!("enrichment reply contains no JSON object"))?;
    let value: Value = serde_json::from_str(&reply[start..=end])
        .context("enrichment reply is not valid JSON")?;
    let summary = value
        .get("summary")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let keywords = value
        .get("keywords")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|kw| !kw.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(EnrichmentResult { summary, keywords })
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_plain_json_reply() {
        let result =
            parse_enrichment(r#"{"summary": " Logs in. ", "keywords": ["login", " auth ", ""]}"#)
                .expect("parse");
        assert_eq!(
            result,
            EnrichmentResult {
                summary: "Logs in.".to_string(),
                keywords: vec!["login".to_string(), "auth".to_string()],
            }
        );
    }

    #[test]
    fn parses_fenced_reply_with_missing_fields() {
        let reply = "```json\n{\"keywords\": [\"cart\", 3, \"checkout\"]}\n```";
        let result = parse_enrichment(reply).expect("parse");
        assert_eq!(result.summary, "");
        assert_eq!(result.keywords, vec!["cart", "checkout"]);
    }

    #[test]
    fn rejects_non_json_reply() {
        assert!(parse_enrichment("I cannot help with that").is_err());
        assert!(parse_enrichment("} backwards {").is_err());
    }

    #[test]
    fn prompt_lists_all_sections() {
        let prompt = build_prompt("Checks login", "Auth", "Step 1: Open app");
        assert!(prompt.contains("Feature:\nAuth"));
        assert!(prompt.contains("Description:\nChecks login"));
        assert!(prompt.contains("Steps:\nStep 1: Open app"));
    }

    #[test]
    fn rejects_blank_api_key() {
        let err = OpenAiEnricher::new(
            "  ".to_string(),
            "https://api.openai.com/v1".to_string(),
            "gpt-4o-mini".to_string(),
            0.2,
            300,
            None,
        );
        assert!(err.is_err());
    }
}
