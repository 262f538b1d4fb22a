use std::sync::Arc;

use crate::core::identity::IdentityVerifier;
use crate::core::letters::{LetterService, LetterStore};

/// The storage backend is picked at startup, so the service is built over a
/// trait object.
pub type SharedLetterService = LetterService<Arc<dyn LetterStore>>;

/// Shared across all requests. Nothing in here is mutated per request.
#[derive(Clone)]
pub struct AppState {
    pub letters: Arc<SharedLetterService>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(letters: SharedLetterService, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            letters: Arc::new(letters),
            verifier,
        }
    }
}
