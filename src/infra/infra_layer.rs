// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "letters/letter_stores.rs"]
pub mod letters;

#[path = "google_drive/mod.rs"]
pub mod google_drive;

#[path = "firebase/mod.rs"]
pub mod firebase;
