use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::GenerationParams;
use crate::llm::{non_empty, LlmError, ModelClient};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.into(),
            base_url: GEMINI_API_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl ModelClient for GeminiClient {
    fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            params.model
        );
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": params.temperature,
                "maxOutputTokens": params.max_output_tokens
            }
        });

        debug!(model = %params.model, "calling gemini generateContent");
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let value: Value = response.json()?;
        non_empty(extract_candidate_text(&value))
    }
}

/// Concatenates the text parts of the first candidate.
fn extract_candidate_text(value: &Value) -> Option<String> {
    let candidate = value.get("candidates")?.as_array()?.first()?;
    let parts = candidate.get("content")?.get("parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    Some(text)
}
