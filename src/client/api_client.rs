//! HTTP client for the letters API.
//!
//! Every call fetches a fresh bearer token from the session right before it
//! is sent, so an expired Firebase token is renewed transparently.

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;

use super::session::{ClientError, Session};
use crate::core::letters::{LetterDocument, LetterSummary};

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct LettersApiClient {
    http: Client,
    base_url: String,
}

impl LettersApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn letters_url(&self) -> String {
        format!("{}/api/letters", self.base_url)
    }

    /// The id is escaped as one path segment, whatever it contains.
    fn letter_url(&self, id: &str) -> Result<Url, ClientError> {
        let invalid = || ClientError::InvalidUrl(self.letters_url());
        let mut url = Url::parse(&self.letters_url()).map_err(|_| invalid())?;
        url.path_segments_mut().map_err(|_| invalid())?.push(id);
        Ok(url)
    }

    async fn send(&self, session: &Session, request: RequestBuilder) -> Result<Response, ClientError> {
        let token = session.get_token().await?;
        let response = request.bearer_auth(token).send().await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        Err(ClientError::Status { status, message })
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn list(&self, session: &Session) -> Result<Vec<LetterSummary>, ClientError> {
        let response = self.send(session, self.http.get(self.letters_url())).await?;
        Self::json(response).await
    }

    pub async fn get(&self, session: &Session, id: &str) -> Result<LetterDocument, ClientError> {
        let response = self.send(session, self.http.get(self.letter_url(id)?)).await?;
        Self::json(response).await
    }

    /// Returns the id the server assigned.
    pub async fn create(
        &self,
        session: &Session,
        letter: &LetterDocument,
    ) -> Result<String, ClientError> {
        let request = self.http.post(self.letters_url()).json(letter);
        let created: Created = Self::json(self.send(session, request).await?).await?;
        Ok(created.id)
    }

    pub async fn update(
        &self,
        session: &Session,
        id: &str,
        letter: &LetterDocument,
    ) -> Result<(), ClientError> {
        let request = self.http.put(self.letter_url(id)?).json(letter);
        self.send(session, request).await?;
        Ok(())
    }

    pub async fn delete(&self, session: &Session, id: &str) -> Result<(), ClientError> {
        self.send(session, self.http.delete(self.letter_url(id)?)).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    //! Runs the real router on an ephemeral port for client tests.

    use crate::client::session::{Session, StaticToken, User};
    use crate::core::letters::{LetterService, LetterStore, OwnershipPolicy};
    use crate::http::{build_router, AppState};
    use crate::infra::firebase::test_tokens;
    use crate::infra::letters::InMemoryLetterStore;
    use std::sync::Arc;

    pub async fn spawn() -> String {
        let store: Arc<dyn LetterStore> = Arc::new(InMemoryLetterStore::default());
        let service = LetterService::new(store, OwnershipPolicy::Backend);
        let state = AppState::new(service, Arc::new(test_tokens::verifier()));
        let app = build_router(state, 1024 * 1024);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    pub fn session(uid: &str) -> Session {
        let user = User {
            id: uid.to_string(),
            email: format!("{}@example.com", uid),
            name: uid.to_string(),
            photo_url: None,
        };
        Session::new(user, Arc::new(StaticToken::new(test_tokens::id_token(uid))))
    }

    pub fn expired_session(uid: &str) -> Session {
        let user = User {
            id: uid.to_string(),
            email: String::new(),
            name: uid.to_string(),
            photo_url: None,
        };
        Session::new(
            user,
            Arc::new(StaticToken::new(test_tokens::expired_id_token(uid))),
        )
    }
}
