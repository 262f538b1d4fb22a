//! App shell: routing plus the single session context.

use std::fmt;

use super::api_client::LettersApiClient;
use super::editor_codec::RichTextCodec;
use super::session::{Session, SessionContext, User};
use super::views::{EditorView, HomeView};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Home,
    NewLetter,
    Editor(String),
}

impl Route {
    pub fn parse(path: &str) -> Option<Route> {
        match path.trim_end_matches('/') {
            "" => Some(Route::Home),
            "/login" => Some(Route::Login),
            "/editor" => Some(Route::NewLetter),
            other => other
                .strip_prefix("/editor/")
                .filter(|id| !id.is_empty() && !id.contains('/'))
                .map(|id| Route::Editor(id.to_string())),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Login => write!(f, "/login"),
            Route::Home => write!(f, "/"),
            Route::NewLetter => write!(f, "/editor"),
            Route::Editor(id) => write!(f, "/editor/{}", id),
        }
    }
}

pub struct AppShell {
    api: LettersApiClient,
    context: SessionContext,
    route: Route,
}

impl AppShell {
    pub fn new(api: LettersApiClient) -> Self {
        Self {
            api,
            context: SessionContext::new(),
            route: Route::Login,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.context.user()
    }

    pub fn session(&self) -> Option<&Session> {
        self.context.session()
    }

    /// Context the login view signs into.
    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.context
    }

    /// Moves to `route`, unless nobody is signed in: then every route except
    /// the login screen itself lands on login.
    pub fn navigate(&mut self, route: Route) -> &Route {
        self.route = if self.context.is_signed_in() || route == Route::Login {
            route
        } else {
            Route::Login
        };
        &self.route
    }

    pub fn sign_in(&mut self, session: Session) -> &Route {
        self.context.sign_in(session);
        self.navigate(Route::Home)
    }

    pub fn logout(&mut self) -> &Route {
        self.context.logout();
        self.navigate(Route::Login)
    }

    pub fn home_view(&self) -> Option<HomeView> {
        match (&self.route, self.context.session()) {
            (Route::Home, Some(session)) => {
                Some(HomeView::new(self.api.clone(), session.clone()))
            }
            _ => None,
        }
    }

    pub fn editor_view<C: RichTextCodec>(&self, codec: C) -> Option<EditorView<C>> {
        let session = self.context.session()?.clone();
        let id = match &self.route {
            Route::NewLetter => None,
            Route::Editor(id) => Some(id.clone()),
            _ => return None,
        };
        Some(EditorView::new(self.api.clone(), session, codec, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::api_client::test_server::session;
    use crate::client::editor_codec::DraftRawCodec;

    fn shell() -> AppShell {
        AppShell::new(LettersApiClient::new("http://localhost:3000"))
    }

    #[test]
    fn test_routes_round_trip_through_paths() {
        for route in [
            Route::Login,
            Route::Home,
            Route::NewLetter,
            Route::Editor("abc123".into()),
        ] {
            assert_eq!(Route::parse(&route.to_string()), Some(route));
        }
        assert_eq!(Route::parse("/elsewhere"), None);
        assert_eq!(Route::parse("/editor/a/b"), None);
    }

    #[test]
    fn test_signed_out_routes_go_to_login() {
        let mut app = shell();
        assert_eq!(app.navigate(Route::Home), &Route::Login);
        assert_eq!(app.navigate(Route::Editor("abc".into())), &Route::Login);
        assert!(app.home_view().is_none());
        assert!(app.editor_view(DraftRawCodec).is_none());
    }

    #[test]
    fn test_sign_in_then_logout() {
        let mut app = shell();
        assert_eq!(app.sign_in(session("alice")), &Route::Home);
        assert!(app.home_view().is_some());

        app.navigate(Route::Editor("abc".into()));
        let editor = app.editor_view(DraftRawCodec).unwrap();
        assert_eq!(editor.id(), Some("abc"));

        assert_eq!(app.logout(), &Route::Login);
        assert!(app.user().is_none());
        assert_eq!(app.navigate(Route::NewLetter), &Route::Login);
    }

    #[test]
    fn test_new_letter_editor_has_no_id() {
        let mut app = shell();
        app.sign_in(session("alice"));
        app.navigate(Route::NewLetter);

        let editor = app.editor_view(DraftRawCodec).unwrap();
        assert_eq!(editor.heading(), "New Letter");
    }
}
