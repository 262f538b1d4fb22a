// Local implementations of the letter store. Production uses Google Drive
// (see `infra::google_drive`); these back tests and offline development.

pub mod in_memory;
pub mod json_store;

// Re-export for convenience
pub use in_memory::InMemoryLetterStore;
pub use json_store::JsonLetterStore;
