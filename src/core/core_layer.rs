// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "letters/mod.rs"]
pub mod letters;

#[path = "identity/identity_service.rs"]
pub mod identity;
