//! In-memory storage implementation.

use super::{BoxFuture, Storage, StorageError, StorageResult, check_id};
use crate::scene::SceneDocument;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// In-memory storage for tests and scratch documents.
///
/// Documents are cloned on save, so later edits to the caller's copy do not
/// leak into storage. Undo history is not kept.
#[derive(Default)]
pub struct MemoryStorage {
    documents: RwLock<BTreeMap<String, SceneDocument>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn save(&self, id: &str, document: &SceneDocument) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        let mut document = document.clone();
        document.clear_history();
        Box::pin(async move {
            check_id(&id)?;
            let mut docs = self.documents.write().map_err(StorageError::lock)?;
            log::debug!("Saved {} elements as {id}", document.len());
            docs.insert(id, document);
            Ok(())
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<SceneDocument>> {
        let id = id.to_string();
        Box::pin(async move {
            let docs = self.documents.read().map_err(StorageError::lock)?;
            docs.get(&id).cloned().ok_or(StorageError::NotFound(id))
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut docs = self.documents.write().map_err(StorageError::lock)?;
            docs.remove(&id);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let docs = self.documents.read().map_err(StorageError::lock)?;
            Ok(docs.keys().cloned().collect())
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let id = id.to_string();
        Box::pin(async move {
            let docs = self.documents.read().map_err(StorageError::lock)?;
            Ok(docs.contains_key(&id))
        })
    }
}
