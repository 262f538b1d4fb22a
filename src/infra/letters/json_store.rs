use crate::core::letters::{LetterStore, LetterSummary, ListFilter, NewFile, StoreError};
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tokio::sync::RwLock;

/// JSON-file backed letter store. Persist every file in a single JSON document:
/// { files: { id: StoredFile }, issued: [id, ...] }
#[derive(Debug, Serialize, Deserialize, Default)]
struct JsonStoreData {
    #[serde(default)]
    files: HashMap<String, StoredFile>,
    #[serde(default)]
    issued: HashSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredFile {
    name: String,
    mime_type: String,
    #[serde(default)]
    owner: Option<String>,
    /// Base64 so arbitrary bodies survive the trip through JSON.
    body: String,
    modified_time: DateTime<Utc>,
}

pub struct JsonLetterStore {
    path: PathBuf,
    cache: RwLock<JsonStoreData>,
}

impl JsonLetterStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let cache: JsonStoreData = if path.exists() {
            let file = std::fs::File::open(&path)?;
            serde_json::from_reader(std::io::BufReader::new(file))?
        } else {
            JsonStoreData::default()
        };

        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    /// Writes `data` out. Callers hold the write lock throughout and undo
    /// their change when this fails, so the cache never runs ahead of disk.
    async fn persist(&self, data: &JsonStoreData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_vec_pretty(data)?;
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }

    fn decode_body(file: &StoredFile) -> Result<Vec<u8>, StoreError> {
        STANDARD
            .decode(&file.body)
            .map_err(|e| StoreError::Backend(format!("corrupt body: {}", e)))
    }
}

fn fresh_id(issued: &HashSet<String>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let mut bytes = [0u8; 18];
        rng.fill_bytes(&mut bytes);
        let id = URL_SAFE_NO_PAD.encode(bytes);
        if !issued.contains(&id) {
            return id;
        }
    }
}

#[async_trait]
impl LetterStore for JsonLetterStore {
    async fn list(&self, filter: &ListFilter) -> Result<Vec<LetterSummary>, StoreError> {
        let cache = self.cache.read().await;
        let mut letters: Vec<LetterSummary> = cache
            .files
            .iter()
            .filter(|(_, f)| f.mime_type == filter.mime_type)
            .filter(|(_, f)| filter.owner.is_none() || f.owner == filter.owner)
            .map(|(id, f)| LetterSummary {
                id: id.clone(),
                name: f.name.clone(),
                modified_time: f.modified_time,
            })
            .collect();

        letters.sort_by(|a, b| b.modified_time.cmp(&a.modified_time).then(a.id.cmp(&b.id)));
        Ok(letters)
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let cache = self.cache.read().await;
        let file = cache
            .files
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Self::decode_body(file)
    }

    async fn create(&self, file: NewFile) -> Result<String, StoreError> {
        let mut cache = self.cache.write().await;
        let id = fresh_id(&cache.issued);
        cache.issued.insert(id.clone());
        cache.files.insert(
            id.clone(),
            StoredFile {
                name: file.name,
                mime_type: file.mime_type,
                owner: file.owner,
                body: STANDARD.encode(&file.body),
                modified_time: Utc::now(),
            },
        );
        if let Err(e) = self.persist(&cache).await {
            cache.files.remove(&id);
            cache.issued.remove(&id);
            return Err(e);
        }
        Ok(id)
    }

    async fn overwrite(&self, id: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        let file = cache
            .files
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let previous = file.clone();
        file.body = STANDARD.encode(&body);
        file.modified_time = Utc::now();

        if let Err(e) = self.persist(&cache).await {
            cache.files.insert(id.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        let removed = cache
            .files
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Err(e) = self.persist(&cache).await {
            cache.files.insert(id.to_string(), removed);
            return Err(e);
        }
        Ok(())
    }

    async fn owner_of(&self, id: &str) -> Result<Option<String>, StoreError> {
        let cache = self.cache.read().await;
        cache
            .files
            .get(id)
            .map(|f| f.owner.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
