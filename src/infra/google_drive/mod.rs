// =============================================================================
// GOOGLE DRIVE MODULE
// =============================================================================
//
// Letters live as JSON files in Google Drive. This module lives in the infra
// layer because it handles external I/O (HTTP requests to Google APIs). The
// core layer only knows about the `LetterStore` port.
//
// **Pieces:**
// - `drive_auth`   - turns a Google credential into short-lived access tokens
// - `drive_client` - the `LetterStore` implementation over Drive v3

pub mod drive_auth;
pub mod drive_client;

pub use drive_auth::{AccessTokenProvider, RefreshTokenAuth, ServiceAccountAuth, StaticAccessToken};
pub use drive_client::GoogleDriveStore;
