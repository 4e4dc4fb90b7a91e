use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::store::{decode_document, write_atomic, DocumentId, DocumentStore, StoreError, StoredDocument};

/// One pretty-printed JSON file per document under a root directory.
///
/// The directory is created on the first write.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &DocumentId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

impl DocumentStore for FileStore {
    fn save(&self, document: &StoredDocument) -> Result<(), StoreError> {
        let path = self.path_for(&document.id);
        let text = serde_json::to_string_pretty(document)?;
        write_atomic(&path, text.as_bytes())?;
        debug!(id = %document.id, path = %path.display(), version = document.version, "document saved");
        Ok(())
    }

    fn get(&self, id: &DocumentId) -> Result<StoredDocument, StoreError> {
        let path = self.path_for(id);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        decode_document(&path, &text)
    }

    fn delete(&self, id: &DocumentId) -> Result<(), StoreError> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn list(&self) -> Result<Vec<StoredDocument>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut documents = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable directory entry");
                    continue;
                }
            };
            let is_document = path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !n.starts_with('.'));
            if !is_document {
                continue;
            }

            let loaded = fs::read_to_string(&path)
                .map_err(|source| StoreError::Io {
                    path: path.clone(),
                    source,
                })
                .and_then(|text| decode_document(&path, &text));
            match loaded {
                Ok(document) => documents.push(document),
                Err(err) => warn!(error = %err, "skipping unreadable document"),
            }
        }

        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(documents)
    }
}
