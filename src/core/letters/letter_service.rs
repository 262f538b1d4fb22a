// This is the letters module - the business logic behind the five CRUD endpoints.
// Nothing here knows about HTTP or Google Drive. The service works with an
// `Identity` and a `LetterStore`, so the same code serves the axum handlers,
// the tests, and any other frontend.

use super::letter_models::{LetterDocument, LetterSummary, OwnershipPolicy, LETTER_MIME_TYPE};
use super::letter_store::{LetterStore, ListFilter, NewFile, StoreError};
use crate::core::identity::Identity;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LetterError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Letter {id} does not belong to {uid}")]
    NotOwner { id: String, uid: String },

    #[error("Failed to encode letter: {0}")]
    Encoding(#[from] serde_json::Error),
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Letter CRUD on top of a storage backend.
///
/// Updates are full overwrites with last-write-wins semantics. There is no
/// version check, so two concurrent saves of the same letter race at the
/// backend and the later one sticks.
pub struct LetterService<S: LetterStore> {
    store: S,
    ownership: OwnershipPolicy,
}

impl<S: LetterStore> LetterService<S> {
    pub fn new(store: S, ownership: OwnershipPolicy) -> Self {
        Self { store, ownership }
    }

    /// All letters visible to the caller. Bodies are never included.
    pub async fn list(&self, identity: &Identity) -> Result<Vec<LetterSummary>, LetterError> {
        let filter = ListFilter {
            mime_type: LETTER_MIME_TYPE.to_string(),
            owner: self.owner_tag(identity),
        };

        let letters = self.store.list(&filter).await?;
        tracing::debug!(uid = %identity.uid, count = letters.len(), "Listed letters");
        Ok(letters)
    }

    /// The stored body exactly as the backend returned it.
    pub async fn read(&self, identity: &Identity, id: &str) -> Result<Vec<u8>, LetterError> {
        self.ensure_owner(identity, id).await?;
        Ok(self.store.fetch(id).await?)
    }

    /// Store a new letter and return the id the backend assigned to it.
    pub async fn create(
        &self,
        identity: &Identity,
        document: &LetterDocument,
    ) -> Result<String, LetterError> {
        let file = NewFile {
            name: document.title.clone(),
            mime_type: LETTER_MIME_TYPE.to_string(),
            owner: self.owner_tag(identity),
            body: Self::encode(document)?,
        };

        let id = self.store.create(file).await?;
        tracing::info!(uid = %identity.uid, letter_id = %id, "Created letter");
        Ok(id)
    }

    /// Replace the whole body of an existing letter.
    pub async fn update(
        &self,
        identity: &Identity,
        id: &str,
        document: &LetterDocument,
    ) -> Result<(), LetterError> {
        self.ensure_owner(identity, id).await?;
        self.store.overwrite(id, Self::encode(document)?).await?;
        tracing::info!(uid = %identity.uid, letter_id = %id, "Updated letter");
        Ok(())
    }

    pub async fn delete(&self, identity: &Identity, id: &str) -> Result<(), LetterError> {
        self.ensure_owner(identity, id).await?;
        self.store.remove(id).await?;
        tracing::info!(uid = %identity.uid, letter_id = %id, "Deleted letter");
        Ok(())
    }

    /// The stored body is the JSON encoding of `{title, content}`.
    fn encode(document: &LetterDocument) -> Result<Vec<u8>, LetterError> {
        Ok(serde_json::to_vec(document)?)
    }

    fn owner_tag(&self, identity: &Identity) -> Option<String> {
        match self.ownership {
            OwnershipPolicy::Backend => None,
            OwnershipPolicy::Explicit => Some(identity.uid.clone()),
        }
    }

    async fn ensure_owner(&self, identity: &Identity, id: &str) -> Result<(), LetterError> {
        if self.ownership == OwnershipPolicy::Backend {
            return Ok(());
        }

        match self.store.owner_of(id).await? {
            Some(owner) if owner == identity.uid => Ok(()),
            _ => Err(LetterError::NotOwner {
                id: id.to_string(),
                uid: identity.uid.clone(),
            }),
        }
    }
}
