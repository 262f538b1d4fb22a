// =============================================================================
// FIREBASE SIGN-IN
// =============================================================================
//
// The client signs in through the Firebase Auth REST API:
//
// 1. A Google credential (ID token or OAuth access token carrying the
//    `drive.file` scope) is exchanged at `accounts:signInWithIdp` for a
//    Firebase ID token plus a refresh token.
// 2. The ID token is the bearer token for every letters API call. It lives
//    for an hour; `RefreshingIdToken` trades the refresh token for a new one
//    at `securetoken.googleapis.com` shortly before it expires.
//
// Only the Firebase Web API key is needed (`FIREBASE_API_KEY`).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

use super::session::{ClientError, Session, TokenSource, User};

/// Access requested from Google at sign-in: per-file Drive access.
pub const GOOGLE_SIGN_IN_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

/// Refresh this long before the ID token actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// What the Google sign-in popup handed back.
#[derive(Debug, Clone)]
pub enum GoogleCredential {
    IdToken(String),
    AccessToken(String),
}

impl GoogleCredential {
    /// Form-encoded `postBody` for `accounts:signInWithIdp`.
    fn post_body(&self) -> Result<String, ClientError> {
        let (kind, token) = match self {
            GoogleCredential::IdToken(token) => ("id_token", token),
            GoogleCredential::AccessToken(token) => ("access_token", token),
        };
        serde_urlencoded::to_string([(kind, token.as_str()), ("providerId", "google.com")])
            .map_err(|e| ClientError::Auth(format!("Could not encode credential: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    photo_url: Option<String>,
    id_token: String,
    refresh_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: String,
}

/// `securetoken` answers in snake_case, unlike identitytoolkit.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    photo_url: Option<String>,
}

fn default_expires_in() -> String {
    "3600".to_string()
}

fn parse_expires_in(value: &str) -> u64 {
    value.parse().unwrap_or(3600)
}

/// Thin client for the two Firebase Auth endpoints the app needs.
#[derive(Clone)]
pub struct FirebaseAuthClient {
    http: Client,
    api_key: String,
    identity_url: String,
    secure_token_url: String,
}

impl FirebaseAuthClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_urls(api_key, IDENTITY_TOOLKIT_URL, SECURE_TOKEN_URL)
    }

    pub fn with_base_urls(
        api_key: impl Into<String>,
        identity_url: impl Into<String>,
        secure_token_url: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            identity_url: identity_url.into(),
            secure_token_url: secure_token_url.into(),
        }
    }

    /// Exchanges a Google credential for a Firebase session.
    pub async fn sign_in_with_google(
        &self,
        credential: &GoogleCredential,
    ) -> Result<Session, ClientError> {
        let url = format!(
            "{}/accounts:signInWithIdp?key={}",
            self.identity_url, self.api_key
        );
        let body = json!({
            "postBody": credential.post_body()?,
            "requestUri": "http://localhost",
            "returnSecureToken": true,
            "returnIdpCredential": true,
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let signed_in: SignInResponse = auth_json(response).await?;

        let user = User {
            id: signed_in.local_id,
            email: signed_in.email,
            name: signed_in.display_name,
            photo_url: signed_in.photo_url,
        };
        let tokens = RefreshingIdToken::new(self.clone(), signed_in.refresh_token)
            .primed(signed_in.id_token, parse_expires_in(&signed_in.expires_in))
            .await;

        Ok(Session::new(user, Arc::new(tokens)))
    }

    /// Rebuilds a session from a refresh token saved by an earlier sign-in.
    pub async fn restore(&self, refresh_token: impl Into<String>) -> Result<Session, ClientError> {
        let tokens = RefreshingIdToken::new(self.clone(), refresh_token.into());
        let id_token = tokens.get_token().await?;
        let user = self.lookup(&id_token).await?;
        Ok(Session::new(user, Arc::new(tokens)))
    }

    async fn lookup(&self, id_token: &str) -> Result<User, ClientError> {
        let url = format!("{}/accounts:lookup?key={}", self.identity_url, self.api_key);
        let response = self
            .http
            .post(&url)
            .json(&json!({ "idToken": id_token }))
            .send()
            .await?;
        let found: LookupResponse = auth_json(response).await?;

        let user = found
            .users
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Auth("No account for this token".to_string()))?;
        Ok(User {
            id: user.local_id,
            email: user.email,
            name: user.display_name,
            photo_url: user.photo_url,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ClientError> {
        let url = format!("{}/token?key={}", self.secure_token_url, self.api_key);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;
        auth_json(response).await
    }
}

/// Maps a non-2xx answer from Firebase Auth to `ClientError::Auth`.
async fn auth_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(ClientError::Auth(format!("{}: {}", status, text)));
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

// =============================================================================
// REFRESHING ID TOKEN
// =============================================================================

struct CachedIdToken {
    token: String,
    expires_at: SystemTime,
}

struct RefreshState {
    refresh_token: String,
    cached: Option<CachedIdToken>,
}

/// A Firebase ID token that renews itself from the refresh token.
pub struct RefreshingIdToken {
    auth: FirebaseAuthClient,
    state: RwLock<RefreshState>,
}

impl RefreshingIdToken {
    pub fn new(auth: FirebaseAuthClient, refresh_token: String) -> Self {
        Self {
            auth,
            state: RwLock::new(RefreshState {
                refresh_token,
                cached: None,
            }),
        }
    }

    async fn primed(self, id_token: String, expires_in: u64) -> Self {
        {
            let mut state = self.state.write().await;
            state.cached = Some(CachedIdToken {
                token: id_token,
                expires_at: SystemTime::now() + Duration::from_secs(expires_in),
            });
        }
        self
    }
}

#[async_trait]
impl TokenSource for RefreshingIdToken {
    async fn get_token(&self) -> Result<String, ClientError> {
        {
            let state = self.state.read().await;
            if let Some(cached) = state
                .cached
                .as_ref()
                .filter(|c| c.expires_at > SystemTime::now() + EXPIRY_MARGIN)
            {
                return Ok(cached.token.clone());
            }
        }

        let mut state = self.state.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(cached) = state
            .cached
            .as_ref()
            .filter(|c| c.expires_at > SystemTime::now() + EXPIRY_MARGIN)
        {
            return Ok(cached.token.clone());
        }

        let fresh = self.auth.refresh(&state.refresh_token).await?;
        tracing::debug!("Refreshed Firebase ID token");
        state.refresh_token = fresh.refresh_token;
        state.cached = Some(CachedIdToken {
            token: fresh.id_token.clone(),
            expires_at: SystemTime::now() + Duration::from_secs(parse_expires_in(&fresh.expires_in)),
        });
        Ok(fresh.id_token)
    }

    /// Rotates on every refresh.
    async fn refresh_token(&self) -> Option<String> {
        Some(self.state.read().await.refresh_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> FirebaseAuthClient {
        FirebaseAuthClient::with_base_urls("web-key", server.uri(), server.uri())
    }

    #[test]
    fn test_post_body_is_form_encoded() {
        let body = GoogleCredential::AccessToken("ya29.a+b/c=&d".into())
            .post_body()
            .unwrap();
        assert_eq!(body, "access_token=ya29.a%2Bb%2Fc%3D%26d&providerId=google.com");
    }

    #[tokio::test]
    async fn test_sign_in_maps_profile_and_uses_id_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts:signInWithIdp"))
            .and(query_param("key", "web-key"))
            .and(body_string_contains("id_token=google-jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "localId": "uid-7",
                "email": "ada@example.com",
                "displayName": "Ada Lovelace",
                "photoUrl": "https://example.com/ada.png",
                "idToken": "firebase-id-token",
                "refreshToken": "refresh-1",
                "expiresIn": "3600"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = client_for(&server)
            .sign_in_with_google(&GoogleCredential::IdToken("google-jwt".into()))
            .await
            .unwrap();

        assert_eq!(session.user().id, "uid-7");
        assert_eq!(session.user().name, "Ada Lovelace");
        assert_eq!(
            session.user().photo_url.as_deref(),
            Some("https://example.com/ada.png")
        );
        // Primed from the sign-in response; no refresh call is made.
        assert_eq!(session.get_token().await.unwrap(), "firebase-id-token");
    }

    #[tokio::test]
    async fn test_sign_in_rejection_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts:signInWithIdp"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"error": {"message": "INVALID_IDP_RESPONSE"}})),
            )
            .mount(&server)
            .await;

        let result = client_for(&server)
            .sign_in_with_google(&GoogleCredential::AccessToken("stale".into()))
            .await;
        assert!(matches!(result, Err(ClientError::Auth(_))));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id_token": "renewed",
                "refresh_token": "refresh-2",
                "expires_in": "3600",
                "user_id": "uid-7"
            })))
            .expect(1)
            .mount(&server)
            .await;

        // Primed with a token that is already inside the expiry margin.
        let tokens = RefreshingIdToken::new(client_for(&server), "refresh-1".into())
            .primed("old".into(), 10)
            .await;

        assert_eq!(tokens.get_token().await.unwrap(), "renewed");
        assert_eq!(tokens.get_token().await.unwrap(), "renewed");
        assert_eq!(tokens.refresh_token().await.as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn test_restore_looks_up_profile() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id_token": "restored",
                "refresh_token": "refresh-1",
                "expires_in": "3600"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/accounts:lookup"))
            .and(body_string_contains("restored"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [{"localId": "uid-7", "email": "ada@example.com", "displayName": "Ada"}]
            })))
            .mount(&server)
            .await;

        let session = client_for(&server).restore("refresh-1").await.unwrap();
        assert_eq!(session.user().id, "uid-7");
        assert_eq!(session.user().photo_url, None);
        assert_eq!(session.get_token().await.unwrap(), "restored");
    }
}
