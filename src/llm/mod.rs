//! Boundary to the external generation model.

pub mod gemini;
pub mod openai;
pub mod prompt;

use crate::config::{Config, GenerationParams, Provider};
use crate::error::FormgenError;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model returned no text")]
    Empty,
}

/// Sends one prompt and returns the model's raw text.
///
/// Implementations never retry; a failure goes straight back to the caller.
pub trait ModelClient {
    fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError>;
}

impl<T: ModelClient + ?Sized> ModelClient for Box<T> {
    fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        (**self).complete(prompt, params)
    }
}

impl<T: ModelClient + ?Sized> ModelClient for &T {
    fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        (**self).complete(prompt, params)
    }
}

/// Builds the client for the configured provider, failing fast when the
/// credential is absent.
pub fn client_from_config(config: &Config) -> Result<Box<dyn ModelClient>, FormgenError> {
    let api_key = config.require_api_key()?.to_string();
    let client: Box<dyn ModelClient> = match config.provider {
        Provider::Gemini => {
            let mut client = gemini::GeminiClient::new(api_key, config.timeout)?;
            if let Some(url) = &config.base_url {
                client = client.with_base_url(url.clone());
            }
            Box::new(client)
        }
        Provider::OpenAi => {
            let mut client = openai::OpenAiClient::new(api_key, config.timeout)?;
            if let Some(url) = &config.base_url {
                client = client.with_base_url(url.clone());
            }
            Box::new(client)
        }
    };
    Ok(client)
}

/// Rejects responses that carry no usable text. Text that passes is
/// returned exactly as the model sent it.
pub(crate) fn non_empty(text: Option<String>) -> Result<String, LlmError> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(LlmError::Empty),
    }
}
