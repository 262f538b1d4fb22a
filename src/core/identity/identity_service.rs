// Identity verification port.
//
// The core only needs to know WHO is calling. How a bearer token turns into
// an identity (Firebase ID tokens, a fake in tests) lives in the infra layer.

use async_trait::async_trait;
use thiserror::Error;

/// The verified caller, decoded from an identity token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user id assigned by the identity provider.
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            name: None,
            picture: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No token provided")]
    MissingToken,

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Could not fetch verification keys: {0}")]
    KeyFetch(String),
}

/// Verifies identity tokens. One call per request, no session state.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}
