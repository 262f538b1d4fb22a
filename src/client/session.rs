// Session context for the client.
//
// The signed-in user lives in ONE place: a `SessionContext` owned by the app
// shell. Views receive a `Session` handle explicitly instead of reaching for
// a global. Logging out clears the context; nothing is ever written to disk.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Sign-in failed: {0}")]
    Auth(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid API address: {0}")]
    InvalidUrl(String),
}

/// The profile of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Hands out a currently valid identity token.
///
/// `get_token` may suspend while an expired token is refreshed, so every API
/// call awaits it right before sending.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn get_token(&self) -> Result<String, ClientError>;

    /// A long-lived credential that can rebuild this source later, if any.
    async fn refresh_token(&self) -> Option<String> {
        None
    }
}

/// A token that is used as-is until the server starts rejecting it.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn get_token(&self) -> Result<String, ClientError> {
        Ok(self.0.clone())
    }
}

/// A signed-in user plus the capability to obtain tokens for them.
#[derive(Clone)]
pub struct Session {
    user: User,
    tokens: Arc<dyn TokenSource>,
}

impl Session {
    pub fn new(user: User, tokens: Arc<dyn TokenSource>) -> Self {
        Self { user, tokens }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub async fn get_token(&self) -> Result<String, ClientError> {
        self.tokens.get_token().await
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens.refresh_token().await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("user", &self.user).finish()
    }
}

/// Holds at most one session for the lifetime of the process.
#[derive(Debug, Default)]
pub struct SessionContext {
    session: Option<Session>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any previous session.
    pub fn sign_in(&mut self, session: Session) {
        tracing::info!(uid = %session.user().id, "Signed in");
        self.session = Some(session);
    }

    /// Tears the session down and returns the user that was signed in.
    pub fn logout(&mut self) -> Option<User> {
        let user = self.session.take().map(|s| s.user);
        if let Some(user) = &user {
            tracing::info!(uid = %user.id, "Signed out");
        }
        user
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(Session::user)
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }
}
