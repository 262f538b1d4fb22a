//! The login screen.

use crate::client::app::Route;
use crate::client::firebase_auth::{FirebaseAuthClient, GoogleCredential};
use crate::client::session::{ClientError, SessionContext};

pub struct LoginView {
    auth: FirebaseAuthClient,
}

impl LoginView {
    pub fn new(auth: FirebaseAuthClient) -> Self {
        Self { auth }
    }

    /// Exchanges the Google credential and stores the session in `context`.
    /// On failure the context is left untouched and the user stays here.
    pub async fn sign_in(
        &self,
        context: &mut SessionContext,
        credential: &GoogleCredential,
    ) -> Result<Route, ClientError> {
        match self.auth.sign_in_with_google(credential).await {
            Ok(session) => {
                context.sign_in(session);
                Ok(Route::Home)
            }
            Err(e) => {
                tracing::error!("Error during Google sign in: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_sign_in_fills_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts:signInWithIdp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "uid-1",
                "email": "ada@example.com",
                "displayName": "Ada",
                "idToken": "id",
                "refreshToken": "refresh",
                "expiresIn": "3600"
            })))
            .mount(&server)
            .await;

        let view = LoginView::new(FirebaseAuthClient::with_base_urls(
            "key",
            server.uri(),
            server.uri(),
        ));
        let mut context = SessionContext::new();

        let route = view
            .sign_in(&mut context, &GoogleCredential::IdToken("g".into()))
            .await
            .unwrap();

        assert_eq!(route, Route::Home);
        assert_eq!(context.user().map(|u| u.id.as_str()), Some("uid-1"));
    }

    #[tokio::test]
    async fn test_failed_sign_in_leaves_context_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let view = LoginView::new(FirebaseAuthClient::with_base_urls(
            "key",
            server.uri(),
            server.uri(),
        ));
        let mut context = SessionContext::new();

        assert!(view
            .sign_in(&mut context, &GoogleCredential::IdToken("g".into()))
            .await
            .is_err());
        assert!(!context.is_signed_in());
    }
}
