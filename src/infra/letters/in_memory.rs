// In-memory implementation of LetterStore.
//
// Used by the tests and by `LETTERS_STORAGE=memory` for local development.
// It mimics the parts of Drive the service relies on: opaque generated ids,
// a modified timestamp per file, and ids that are never handed out twice.

use crate::core::letters::{LetterStore, LetterSummary, ListFilter, NewFile, StoreError};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use rand::RngCore;

/// One stored file.
#[derive(Clone, Debug)]
struct StoredFile {
    name: String,
    mime_type: String,
    owner: Option<String>,
    body: Vec<u8>,
    modified_time: DateTime<Utc>,
}

/// **DashMap:**
/// Requests are handled concurrently, so the map must be shareable across
/// tasks without wrapping the whole store in a Mutex.
pub struct InMemoryLetterStore {
    files: DashMap<String, StoredFile>,
    /// Every id ever issued, including deleted ones.
    issued: DashSet<String>,
}

impl InMemoryLetterStore {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
            issued: DashSet::new(),
        }
    }

    fn next_id(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let mut bytes = [0u8; 18];
            rng.fill_bytes(&mut bytes);
            let id = URL_SAFE_NO_PAD.encode(bytes);
            // insert() returns false when the id was seen before
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }
}

#[async_trait]
impl LetterStore for InMemoryLetterStore {
    async fn list(&self, filter: &ListFilter) -> Result<Vec<LetterSummary>, StoreError> {
        let mut letters: Vec<LetterSummary> = self
            .files
            .iter()
            .filter(|entry| entry.value().mime_type == filter.mime_type)
            .filter(|entry| match &filter.owner {
                Some(owner) => entry.value().owner.as_deref() == Some(owner.as_str()),
                None => true,
            })
            .map(|entry| LetterSummary {
                id: entry.key().clone(),
                name: entry.value().name.clone(),
                modified_time: entry.value().modified_time,
            })
            .collect();

        // Most recently modified first, like the Drive UI
        letters.sort_by(|a, b| b.modified_time.cmp(&a.modified_time).then(a.id.cmp(&b.id)));
        Ok(letters)
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        self.files
            .get(id)
            .map(|entry| entry.body.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn create(&self, file: NewFile) -> Result<String, StoreError> {
        let id = self.next_id();
        self.files.insert(
            id.clone(),
            StoredFile {
                name: file.name,
                mime_type: file.mime_type,
                owner: file.owner,
                body: file.body,
                modified_time: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn overwrite(&self, id: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let mut entry = self
            .files
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.body = body;
        entry.modified_time = Utc::now();
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.files
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn owner_of(&self, id: &str) -> Result<Option<String>, StoreError> {
        self.files
            .get(id)
            .map(|entry| entry.owner.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

impl Default for InMemoryLetterStore {
    fn default() -> Self {
        Self::new()
    }
}
