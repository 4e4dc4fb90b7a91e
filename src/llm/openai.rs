use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::GenerationParams;
use crate::llm::{non_empty, LlmError, ModelClient};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "You generate form and table definitions. \
Output must be a single JSON object (no markdown, no commentary).";

/// Client for the OpenAI Responses API.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.into(),
            base_url: OPENAI_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl ModelClient for OpenAiClient {
    fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        let payload = json!({
            "model": params.model,
            "input": [
                {
                    "role": "system",
                    "content": [{"type": "input_text", "text": SYSTEM_PROMPT}]
                },
                {
                    "role": "user",
                    "content": [{"type": "input_text", "text": prompt}]
                }
            ],
            "temperature": params.temperature,
            "max_output_tokens": params.max_output_tokens
        });

        debug!(model = %params.model, "calling openai responses");
        let response = self
            .client
            .post(format!("{}/responses", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let value: Value = response.json()?;
        non_empty(extract_output_text(&value))
    }
}

fn extract_output_text(value: &Value) -> Option<String> {
    let outputs = value.get("output")?.as_array()?;
    for item in outputs {
        let Some(contents) = item.get("content").and_then(Value::as_array) else {
            continue;
        };
        for content in contents {
            let content_type = content.get("type").and_then(|v| v.as_str());
            if content_type == Some("output_text") || content_type == Some("text") {
                if let Some(text) = content.get("text").and_then(|v| v.as_str()) {
                    return Some(text.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_reasoning_items_without_content() {
        let value = json!({
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "content": [{"type": "output_text", "text": "{\"title\":\"T\"}"}]}
            ]
        });
        assert_eq!(extract_output_text(&value).as_deref(), Some("{\"title\":\"T\"}"));
    }

    #[test]
    fn missing_output_yields_none() {
        assert_eq!(extract_output_text(&json!({"output": []})), None);
        assert_eq!(extract_output_text(&json!({"error": "x"})), None);
    }
}
