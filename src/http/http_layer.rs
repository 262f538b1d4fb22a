// HTTP layer - the axum server in front of the letter service.
//
// **Notice the pattern:**
// 1. The auth middleware turns a bearer token into an `Identity`
// 2. Handlers pull primitive data out of the request and call the core service
// 3. Errors are mapped to fixed status codes and messages
//
// This layer is THIN - no business logic, just translation.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
