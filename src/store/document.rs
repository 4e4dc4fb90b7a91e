use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dsl::model::{Definition, TargetKind};
use crate::store::StoreError;

const MAX_ID_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// A fresh id: 32 lowercase hex characters.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accepts caller-supplied ids; only ASCII letters, digits, `-` and `_`
    /// so an id can never escape the store directory.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let raw = raw.trim();
        let valid = !raw.is_empty()
            && raw.len() <= MAX_ID_LEN
            && raw.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(StoreError::InvalidId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: DocumentId,
    pub kind: TargetKind,
    pub definition: Definition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default = "first_version")]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn first_version() -> u64 {
    1
}

impl StoredDocument {
    pub fn new(definition: Definition, prompt: Option<String>) -> Self {
        Self {
            id: DocumentId::generate(),
            kind: definition.kind(),
            definition,
            prompt,
            version: first_version(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Next version of this document: same id and creation time.
    pub fn revised(&self, definition: Definition) -> Self {
        Self {
            id: self.id.clone(),
            kind: definition.kind(),
            definition,
            prompt: self.prompt.clone(),
            version: self.version + 1,
            created_at: self.created_at,
            updated_at: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::validator::validate_table;
    use serde_json::json;

    #[test]
    fn generated_ids_are_hex_and_parse_back() {
        let id = DocumentId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(DocumentId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn path_like_ids_are_rejected() {
        let too_long = "x".repeat(65);
        for raw in ["", "../secrets", "a/b", "a.json", too_long.as_str()] {
            assert!(DocumentId::parse(raw).is_err(), "{raw} should be rejected");
        }
        assert!(DocumentId::parse("0b6f1c1e-7d4a-4c1e-9a5b-2f0d8c3e4a11").is_ok());
    }

    #[test]
    fn revision_keeps_identity() {
        let table = validate_table(&json!({
            "title": "T",
            "columns": [{"name": "A", "type": "string"}]
        }))
        .unwrap();
        let doc = StoredDocument::new(Definition::Table(table.clone()), Some("things".into()));
        let mut renamed = table;
        renamed.title = "Renamed".into();
        let next = doc.revised(Definition::Table(renamed));

        assert_eq!(next.id, doc.id);
        assert_eq!(next.created_at, doc.created_at);
        assert_eq!(next.version, 2);
        assert!(next.updated_at.is_some());
        assert_eq!(next.definition.title(), "Renamed");
    }

    #[test]
    fn serialized_document_round_trips() {
        let table = validate_table(&json!({
            "title": "T",
            "columns": [{"name": "A", "type": "number"}],
            "sampleData": [{"A": 1}]
        }))
        .unwrap();
        let doc = StoredDocument::new(Definition::Table(table), None);
        let text = serde_json::to_string_pretty(&doc).unwrap();
        assert!(text.contains("\"createdAt\""));
        assert!(text.contains("\"kind\": \"table\""));
        let back: StoredDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(back, doc);
    }
}
