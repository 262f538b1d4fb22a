// Client layer - what a signed-in user drives.
//
// **How the pieces fit:**
// 1. `firebase_auth` turns a Google credential into a `Session`
// 2. `app::AppShell` owns the one `SessionContext` and guards routes on it
// 3. Views get the session handed to them and call `api_client`, one request
//    per action, fetching a fresh token each time
// 4. `editor_codec` is the only code that knows the shape of a letter's content
//
// `commands` puts a command line on top of the views.

pub mod api_client;
pub mod app;
pub mod commands;
pub mod editor_codec;
pub mod firebase_auth;
pub mod notification;
pub mod session;
#[path = "views/views.rs"]
pub mod views;
