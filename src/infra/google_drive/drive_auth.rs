// =============================================================================
// GOOGLE DRIVE CREDENTIALS
// =============================================================================
//
// Every Drive call carries an OAuth2 access token. The server holds ONE Google
// credential and mints short-lived access tokens from it:
//
// 1. **Service Account** (JWT bearer grant):
//    - `GOOGLE_SERVICE_ACCOUNT_KEY` - Path to the JSON key file
//      OR
//    - `GOOGLE_SERVICE_ACCOUNT_JSON` - The JSON content directly
//
// 2. **OAuth refresh token** (a Google account that granted Drive access once):
//    - `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_REFRESH_TOKEN`
//
// 3. **Static access token** (development only, expires after an hour):
//    - `GOOGLE_DRIVE_ACCESS_TOKEN`
//
// Access tokens are cached and refreshed a minute before they expire.

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::core::letters::StoreError;

/// Per-file Drive access: the app can only see files it created.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Anything that can hand out a Drive access token.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, StoreError>;
}

// =============================================================================
// TOKEN CACHE
// =============================================================================

/// An access token and the moment it stops working.
struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

#[derive(Default)]
struct TokenCache {
    cached: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    async fn get(&self) -> Option<String> {
        let cached = self.cached.read().await;
        cached
            .as_ref()
            .filter(|t| t.expires_at > SystemTime::now() + EXPIRY_MARGIN)
            .map(|t| t.token.clone())
    }

    async fn store(&self, token: &str, expires_in: u64) {
        let mut cached = self.cached.write().await;
        *cached = Some(CachedToken {
            token: token.to_string(),
            expires_at: SystemTime::now() + Duration::from_secs(expires_in),
        });
    }
}

/// What the token endpoint returns for either grant.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

async fn exchange(
    client: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, StoreError> {
    let response = client
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| StoreError::Credentials(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(StoreError::Credentials(format!(
            "Token exchange failed ({}): {}",
            status, text
        )));
    }

    response
        .json()
        .await
        .map_err(|e| StoreError::Credentials(e.to_string()))
}

// =============================================================================
// SERVICE ACCOUNT AUTHENTICATION
// =============================================================================

/// The fields of a service account key file that the grant needs.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    /// Issuer of the assertion.
    client_email: String,

    /// Signs the assertion (PKCS#8 PEM).
    private_key: String,

    /// Where the signed assertion is exchanged.
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// Claims of the JWT bearer assertion.
#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    /// Max 1 hour from iat.
    exp: u64,
}

/// Mints Drive access tokens from a service account key.
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    client: Client,
    cache: TokenCache,
}

impl ServiceAccountAuth {
    /// Reads the key file at `path`.
    pub async fn from_file(path: &str) -> Result<Self, StoreError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    /// Parses the contents of a key file.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)?;
        Ok(Self {
            credentials,
            client: Client::new(),
            cache: TokenCache::default(),
        })
    }

    /// Signs a fresh assertion and trades it for an access token.
    async fn fetch_new_token(&self) -> Result<TokenResponse, StoreError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StoreError::Credentials(e.to_string()))?
            .as_secs();

        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: DRIVE_SCOPE.to_string(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| StoreError::Credentials(e.to_string()))?;
        let jwt =
            encode(&header, &claims, &key).map_err(|e| StoreError::Credentials(e.to_string()))?;

        exchange(
            &self.client,
            &self.credentials.token_uri,
            &[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ],
        )
        .await
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String, StoreError> {
        if let Some(token) = self.cache.get().await {
            return Ok(token);
        }

        let fresh = self.fetch_new_token().await?;
        self.cache.store(&fresh.access_token, fresh.expires_in).await;
        tracing::debug!(
            account = %self.credentials.client_email,
            "Refreshed Drive access token"
        );
        Ok(fresh.access_token)
    }
}

// =============================================================================
// OAUTH REFRESH TOKEN AUTHENTICATION
// =============================================================================

/// Authenticator for an installed-app OAuth client holding a refresh token.
pub struct RefreshTokenAuth {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_uri: String,
    client: Client,
    cache: TokenCache,
}

impl RefreshTokenAuth {
    pub fn new(client_id: String, client_secret: String, refresh_token: String) -> Self {
        Self {
            client_id,
            client_secret,
            refresh_token,
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            client: Client::new(),
            cache: TokenCache::default(),
        }
    }

    /// Point the refresh at a different token endpoint.
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }
}

#[async_trait]
impl AccessTokenProvider for RefreshTokenAuth {
    async fn access_token(&self) -> Result<String, StoreError> {
        if let Some(token) = self.cache.get().await {
            return Ok(token);
        }

        let fresh = exchange(
            &self.client,
            &self.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("refresh_token", &self.refresh_token),
            ],
        )
        .await?;

        self.cache.store(&fresh.access_token, fresh.expires_in).await;
        tracing::debug!("Refreshed Drive access token from refresh token");
        Ok(fresh.access_token)
    }
}

// =============================================================================
// STATIC ACCESS TOKEN
// =============================================================================

/// A fixed access token. Useful against local mocks and for quick manual runs.
pub struct StaticAccessToken(pub String);

#[async_trait]
impl AccessTokenProvider for StaticAccessToken {
    async fn access_token(&self) -> Result<String, StoreError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const PRIVATE_KEY: &str = include_str!("../firebase/testdata/rsa_private.pem");
    const PUBLIC_KEY: &str = include_str!("../firebase/testdata/rsa_public.pem");

    #[tokio::test]
    async fn test_refresh_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=r-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.first",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = RefreshTokenAuth::new("id".into(), "secret".into(), "r-123".into())
            .with_token_uri(format!("{}/token", server.uri()));

        assert_eq!(auth.access_token().await.unwrap(), "ya29.first");
        // Second call is served from the cache; the mock expects exactly one hit.
        assert_eq!(auth.access_token().await.unwrap(), "ya29.first");
    }

    #[tokio::test]
    async fn test_refresh_failure_is_credentials_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let auth = RefreshTokenAuth::new("id".into(), "secret".into(), "revoked".into())
            .with_token_uri(format!("{}/token", server.uri()));

        assert!(matches!(
            auth.access_token().await,
            Err(StoreError::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn test_service_account_signs_drive_scoped_assertion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("jwt-bearer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.sa",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let token_uri = format!("{}/token", server.uri());
        let key_json = serde_json::json!({
            "client_email": "letters@example.iam.gserviceaccount.com",
            "private_key": PRIVATE_KEY,
            "token_uri": token_uri,
        });
        let auth = ServiceAccountAuth::from_json(&key_json.to_string()).unwrap();

        assert_eq!(auth.access_token().await.unwrap(), "ya29.sa");

        // Inspect the assertion we sent.
        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        let assertion = body
            .split('&')
            .find_map(|pair| pair.strip_prefix("assertion="))
            .unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[token_uri.as_str()]);
        let claims = decode::<JwtClaims>(
            assertion,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap()
        .claims;

        assert_eq!(claims.iss, "letters@example.iam.gserviceaccount.com");
        assert_eq!(claims.scope, DRIVE_SCOPE);
    }
}
