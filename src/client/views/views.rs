// One type per screen. Views never own the session context; they are built
// from the session the app shell hands them and return a `Route` when the
// user should move elsewhere.

pub mod editor;
pub mod home;
pub mod login;

pub use editor::EditorView;
pub use home::{HomeView, HOME_HEADING};
pub use login::LoginView;
