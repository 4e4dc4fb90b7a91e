use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::PathBuf;

use parking_lot::RwLock;

use crate::store::{check_kind, write_atomic, DocumentId, DocumentStore, StoreError, StoredDocument};

/// Documents held in memory, optionally mirrored to one snapshot file that
/// is rewritten after every change and reloaded on open.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<DocumentId, StoredDocument>>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let documents = match fs::read_to_string(&path) {
            Ok(text) => {
                let loaded: HashMap<DocumentId, StoredDocument> =
                    serde_json::from_str(&text).map_err(|err| StoreError::Corrupt {
                        path: path.clone(),
                        reason: err.to_string(),
                    })?;
                for document in loaded.values() {
                    check_kind(&path, document)?;
                }
                loaded
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self {
            documents: RwLock::new(documents),
            snapshot: Some(path),
        })
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    fn write_snapshot(&self, documents: &HashMap<DocumentId, StoredDocument>) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let ordered: BTreeMap<&DocumentId, &StoredDocument> = documents.iter().collect();
        let text = serde_json::to_string_pretty(&ordered)?;
        write_atomic(path, text.as_bytes())
    }
}

impl DocumentStore for MemoryStore {
    fn save(&self, document: &StoredDocument) -> Result<(), StoreError> {
        let mut documents = self.documents.write();
        let previous = documents.insert(document.id.clone(), document.clone());
        if let Err(err) = self.write_snapshot(&documents) {
            match previous {
                Some(previous) => documents.insert(document.id.clone(), previous),
                None => documents.remove(&document.id),
            };
            return Err(err);
        }
        Ok(())
    }

    fn get(&self, id: &DocumentId) -> Result<StoredDocument, StoreError> {
        self.documents
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn delete(&self, id: &DocumentId) -> Result<(), StoreError> {
        let mut documents = self.documents.write();
        let removed = documents
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let Err(err) = self.write_snapshot(&documents) {
            documents.insert(id.clone(), removed);
            return Err(err);
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<StoredDocument>, StoreError> {
        let mut documents: Vec<_> = self.documents.read().values().cloned().collect();
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(documents)
    }
}
