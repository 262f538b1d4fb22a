use super::letter_models::LetterSummary;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Storage credentials error: {0}")]
    Credentials(String),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What the listing should match. The mime type is always set; the owner
/// only when the service enforces ownership itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ListFilter {
    pub mime_type: String,
    pub owner: Option<String>,
}

/// A file about to be created in the storage backend.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub name: String,
    pub mime_type: String,
    pub owner: Option<String>,
    pub body: Vec<u8>,
}

/// Port for the remote file storage (Google Drive in production).
///
/// Every method is exactly one backend call. Implementations never retry.
#[async_trait]
pub trait LetterStore: Send + Sync {
    /// List non-trashed files matching the filter.
    async fn list(&self, filter: &ListFilter) -> Result<Vec<LetterSummary>, StoreError>;

    /// Raw bytes of a file body.
    async fn fetch(&self, id: &str) -> Result<Vec<u8>, StoreError>;

    /// Create a file and return the id the backend assigned.
    async fn create(&self, file: NewFile) -> Result<String, StoreError>;

    /// Replace the body of an existing file.
    async fn overwrite(&self, id: &str, body: Vec<u8>) -> Result<(), StoreError>;

    async fn remove(&self, id: &str) -> Result<(), StoreError>;

    /// The owner tag recorded at creation, if any.
    async fn owner_of(&self, id: &str) -> Result<Option<String>, StoreError>;
}

// Lets the HTTP layer hold a `LetterService<Arc<dyn LetterStore>>` chosen at startup.
#[async_trait]
impl<T: LetterStore + ?Sized> LetterStore for Arc<T> {
    async fn list(&self, filter: &ListFilter) -> Result<Vec<LetterSummary>, StoreError> {
        (**self).list(filter).await
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        (**self).fetch(id).await
    }

    async fn create(&self, file: NewFile) -> Result<String, StoreError> {
        (**self).create(file).await
    }

    async fn overwrite(&self, id: &str, body: Vec<u8>) -> Result<(), StoreError> {
        (**self).overwrite(id, body).await
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        (**self).remove(id).await
    }

    async fn owner_of(&self, id: &str) -> Result<Option<String>, StoreError> {
        (**self).owner_of(id).await
    }
}
