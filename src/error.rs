//! Error taxonomy shared by every stage of the generation pipeline.
//!
//! Stage-local errors (`LlmError`, `StoreError`, `ConfigError`, `SchemaError`)
//! fold into [`FormgenError`], which knows its response status and how to
//! render itself as the external [`ErrorBody`].

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::llm::LlmError;
use crate::store::StoreError;

/// Why a parsed JSON value could not be turned into a definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// A top-level key is missing or has the wrong shape.
    #[error("invalid schema: `{key}` {reason}")]
    InvalidSchema {
        key: String,
        reason: String,
        raw_json: String,
    },

    /// One entry of `fields`/`columns` is unusable; `raw_json` echoes it.
    #[error("invalid field #{index}: {reason}")]
    InvalidField {
        index: usize,
        reason: String,
        raw_json: String,
    },
}

impl SchemaError {
    pub fn raw_json(&self) -> &str {
        match self {
            SchemaError::InvalidSchema { raw_json, .. } | SchemaError::InvalidField { raw_json, .. } => {
                raw_json
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FormgenError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("generation service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("generation service returned an empty response")]
    EmptyResponse,

    #[error("no JSON object found in model response")]
    NoJsonFound { raw_text: String },

    #[error("schema generation failed: {message}")]
    SchemaGenerationFailed {
        raw_text: String,
        cleaned_text: String,
        message: String,
    },

    #[error("{source}")]
    Schema {
        #[source]
        source: SchemaError,
        raw_text: Option<String>,
    },

    #[error("document `{id}` not found")]
    NotFound { id: String },

    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl FormgenError {
    /// HTTP-equivalent status for the external error object.
    pub fn status(&self) -> u16 {
        match self {
            FormgenError::InvalidInput(_) => 400,
            FormgenError::NotFound { .. } => 404,
            FormgenError::NoJsonFound { .. }
            | FormgenError::SchemaGenerationFailed { .. }
            | FormgenError::Schema { .. } => 422,
            FormgenError::ServiceUnavailable(_) | FormgenError::EmptyResponse => 502,
            FormgenError::Config(_) | FormgenError::Storage(_) => 500,
        }
    }

    /// Attaches the model's raw response to a validation failure.
    pub fn with_raw_text(self, raw: &str) -> Self {
        match self {
            FormgenError::Schema { source, raw_text: None } => FormgenError::Schema {
                source,
                raw_text: Some(raw.to_string()),
            },
            other => other,
        }
    }
}

impl From<SchemaError> for FormgenError {
    fn from(source: SchemaError) -> Self {
        FormgenError::Schema { source, raw_text: None }
    }
}

impl From<StoreError> for FormgenError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => FormgenError::NotFound { id },
            StoreError::InvalidId(id) => FormgenError::InvalidInput(format!("`{id}` is not a valid document id")),
            other => FormgenError::Storage(other),
        }
    }
}

impl From<LlmError> for FormgenError {
    fn from(value: LlmError) -> Self {
        match value {
            LlmError::Empty => FormgenError::EmptyResponse,
            other => FormgenError::ServiceUnavailable(other.to_string()),
        }
    }
}

/// External error object; diagnostic fields appear only when the failure
/// actually produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_json: Option<String>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            raw_text: None,
            raw_json: None,
        }
    }

    fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<&FormgenError> for ErrorBody {
    fn from(err: &FormgenError) -> Self {
        match err {
            FormgenError::InvalidInput(message) => ErrorBody::new(message.clone()),
            FormgenError::Config(source) => {
                ErrorBody::new("Generation service is not configured").details(source.to_string())
            }
            FormgenError::ServiceUnavailable(message) => {
                ErrorBody::new("Failed to generate").details(message.clone())
            }
            FormgenError::EmptyResponse => {
                ErrorBody::new("Failed to generate").details("The model returned no text")
            }
            FormgenError::NoJsonFound { raw_text } => ErrorBody {
                raw_text: Some(raw_text.clone()),
                ..ErrorBody::new("Failed to extract JSON").details("No valid JSON found in the response")
            },
            FormgenError::SchemaGenerationFailed {
                raw_text,
                cleaned_text,
                message,
            } => ErrorBody {
                raw_text: Some(raw_text.clone()),
                raw_json: Some(cleaned_text.clone()),
                ..ErrorBody::new("Invalid JSON structure").details(message.clone())
            },
            FormgenError::Schema { source, raw_text } => {
                let headline = match source {
                    SchemaError::InvalidSchema { .. } => "Invalid definition structure",
                    SchemaError::InvalidField { .. } => "Invalid field definition",
                };
                ErrorBody {
                    raw_text: raw_text.clone(),
                    raw_json: Some(source.raw_json().to_string()),
                    ..ErrorBody::new(headline).details(source.to_string())
                }
            }
            FormgenError::NotFound { id } => {
                ErrorBody::new("Document not found").details(format!("no document with id `{id}`"))
            }
            FormgenError::Storage(source) => ErrorBody::new("Storage failure").details(source.to_string()),
        }
    }
}
