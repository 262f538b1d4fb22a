// =============================================================================
// FIREBASE ID TOKEN VERIFICATION
// =============================================================================
//
// Firebase ID tokens are RS256 JWTs signed by Google's `securetoken` service
// account. Verification follows the Firebase Admin rules:
//
// - header `alg` is RS256 and `kid` names one of the published keys
// - signature checks out against that key
// - `aud` is the Firebase project id
// - `iss` is `https://securetoken.google.com/<project id>`
// - `exp` is in the future, `sub` is non-empty
//
// The public keys come from a JWKS endpoint and are cached for as long as its
// `Cache-Control: max-age` allows.

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::{HeaderMap, CACHE_CONTROL};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

use crate::core::identity::{AuthError, Identity, IdentityVerifier};

const SECURETOKEN_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Used when the JWKS response carries no usable `max-age`.
const DEFAULT_KEY_TTL: Duration = Duration::from_secs(60 * 60);

/// The claims we read from a Firebase ID token.
#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Signing keys by `kid`, valid until `expires_at`.
struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    expires_at: SystemTime,
}

pub struct FirebaseTokenVerifier {
    project_id: String,
    client: Client,
    /// `None` means the key set is fixed and never refreshed.
    jwks_url: Option<String>,
    cached_keys: RwLock<Option<CachedKeys>>,
}

impl FirebaseTokenVerifier {
    /// Verifier for a Firebase project using Google's published keys.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self::with_jwks_url(project_id, SECURETOKEN_JWKS_URL)
    }

    pub fn with_jwks_url(project_id: impl Into<String>, jwks_url: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            client: Client::new(),
            jwks_url: Some(jwks_url.into()),
            cached_keys: RwLock::new(None),
        }
    }

    /// Verifier with a fixed key set (emulators and tests).
    pub fn with_keys(project_id: impl Into<String>, keys: HashMap<String, DecodingKey>) -> Self {
        Self {
            project_id: project_id.into(),
            client: Client::new(),
            jwks_url: None,
            cached_keys: RwLock::new(Some(CachedKeys {
                keys,
                expires_at: SystemTime::UNIX_EPOCH,
            })),
        }
    }

    fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    /// Finds the key for `kid`, refreshing the key set when it has expired.
    async fn key_for(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cached = self.cached_keys.read().await;
            if let Some(cached) = cached.as_ref() {
                let fresh = self.jwks_url.is_none() || cached.expires_at > SystemTime::now();
                if fresh {
                    return cached
                        .keys
                        .get(kid)
                        .cloned()
                        .ok_or_else(|| AuthError::Invalid(format!("unknown key id '{}'", kid)));
                }
            }
        }

        let Some(url) = self.jwks_url.as_deref() else {
            return Err(AuthError::Invalid(format!("unknown key id '{}'", kid)));
        };
        let fetched = self.fetch_keys(url).await?;
        let key = fetched.keys.get(kid).cloned();

        {
            let mut cached = self.cached_keys.write().await;
            *cached = Some(fetched);
        }

        key.ok_or_else(|| AuthError::Invalid(format!("unknown key id '{}'", kid)))
    }

    async fn fetch_keys(&self, url: &str) -> Result<CachedKeys, AuthError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeyFetch(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        let ttl = max_age(response.headers()).unwrap_or(DEFAULT_KEY_TTL);
        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        let mut keys = HashMap::new();
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(e) => tracing::warn!("Skipping unusable signing key {}: {}", kid, e),
            }
        }

        tracing::debug!(count = keys.len(), ttl_secs = ttl.as_secs(), "Fetched token signing keys");
        Ok(CachedKeys {
            keys,
            expires_at: SystemTime::now() + ttl,
        })
    }
}

/// Reads `max-age=N` out of a `Cache-Control` header.
fn max_age(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(CACHE_CONTROL)?
        .to_str()
        .ok()?
        .split(',')
        .find_map(|directive| directive.trim().strip_prefix("max-age="))
        .and_then(|secs| secs.parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait]
impl IdentityVerifier for FirebaseTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::Malformed(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::Invalid(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Malformed("missing key id".to_string()))?;

        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[self.issuer()]);
        validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);

        let claims = decode::<FirebaseClaims>(token, &key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e.to_string()),
            })?
            .claims;

        if claims.sub.is_empty() {
            return Err(AuthError::Invalid("empty subject".to_string()));
        }

        Ok(Identity {
            uid: claims.sub,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
        })
    }
}
