//! Durable storage of generated documents keyed by id.

mod document;
mod file;
mod memory;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::dsl::model::Definition;

pub use document::{DocumentId, StoredDocument};
pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document `{0}` not found")]
    NotFound(String),

    #[error("`{0}` is not a valid document id")]
    InvalidId(String),

    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt document at {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Keyed get/put of documents.
///
/// A single `save` is atomic: readers see the previous document or the new
/// one, never a mix. Concurrent saves of one id resolve last-writer-wins.
pub trait DocumentStore {
    /// Writes `document` under its own id, replacing any previous version.
    fn save(&self, document: &StoredDocument) -> Result<(), StoreError>;

    fn get(&self, id: &DocumentId) -> Result<StoredDocument, StoreError>;

    fn delete(&self, id: &DocumentId) -> Result<(), StoreError>;

    /// Every readable document, oldest first.
    fn list(&self) -> Result<Vec<StoredDocument>, StoreError>;

    /// Stores a new document under a fresh id.
    fn put(&self, definition: Definition, prompt: Option<String>) -> Result<StoredDocument, StoreError> {
        let document = StoredDocument::new(definition, prompt);
        self.save(&document)?;
        Ok(document)
    }
}

impl<T: DocumentStore + ?Sized> DocumentStore for &T {
    fn save(&self, document: &StoredDocument) -> Result<(), StoreError> {
        (**self).save(document)
    }

    fn get(&self, id: &DocumentId) -> Result<StoredDocument, StoreError> {
        (**self).get(id)
    }

    fn delete(&self, id: &DocumentId) -> Result<(), StoreError> {
        (**self).delete(id)
    }

    fn list(&self) -> Result<Vec<StoredDocument>, StoreError> {
        (**self).list()
    }
}

/// Writes to a uniquely named sibling temp file, then renames over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("document");
    let tmp = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));
    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));

    if let Err(source) = written {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

fn decode_document(path: &Path, text: &str) -> Result<StoredDocument, StoreError> {
    let document: StoredDocument = serde_json::from_str(text).map_err(|err| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    check_kind(path, &document)?;
    Ok(document)
}

fn check_kind(path: &Path, document: &StoredDocument) -> Result<(), StoreError> {
    if document.kind != document.definition.kind() {
        return Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: format!(
                "kind `{}` does not match a {} definition",
                document.kind,
                document.definition.kind()
            ),
        });
    }
    Ok(())
}
