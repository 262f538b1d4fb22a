pub mod letter_models;
pub mod letter_service;
pub mod letter_store;

pub use letter_models::{LetterDocument, LetterSummary, OwnershipPolicy};
pub use letter_service::{LetterError, LetterService};
pub use letter_store::{ListFilter, NewFile, LetterStore, StoreError};
