// Configuration, read from the environment (and `.env` through dotenv).
//
// Parsing goes through a lookup closure so tests can feed a map instead of
// mutating the process environment.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

use crate::core::letters::OwnershipPolicy;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
const DEFAULT_JSON_PATH: &str = "data/letters.json";
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
const DEFAULT_API_URL: &str = "http://localhost:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error(
        "No Google Drive credentials: set GOOGLE_SERVICE_ACCOUNT_KEY, GOOGLE_SERVICE_ACCOUNT_JSON, \
         GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET/GOOGLE_REFRESH_TOKEN or GOOGLE_DRIVE_ACCESS_TOKEN"
    )]
    NoDriveCredentials,
}

/// The server-side Google credential used for every Drive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveCredentials {
    ServiceAccountFile(String),
    ServiceAccountJson(String),
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
    AccessToken(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Drive(DriveCredentials),
    Memory,
    Json(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub firebase_project_id: String,
    pub storage: StorageBackend,
    pub ownership: OwnershipPolicy,
    pub max_body_bytes: usize,
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = match lookup("PORT") {
            Some(value) => parse("PORT", value)?,
            None => DEFAULT_PORT,
        };
        let ip: IpAddr = parse(
            "LETTERS_BIND_ADDR",
            lookup("LETTERS_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        )?;

        let firebase_project_id = lookup("FIREBASE_PROJECT_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("FIREBASE_PROJECT_ID"))?;

        let storage = match lookup("LETTERS_STORAGE").as_deref().map(str::trim) {
            None | Some("drive") => StorageBackend::Drive(drive_credentials(&lookup)?),
            Some("memory") => StorageBackend::Memory,
            Some("json") => StorageBackend::Json(
                lookup("LETTERS_JSON_PATH")
                    .unwrap_or_else(|| DEFAULT_JSON_PATH.to_string())
                    .into(),
            ),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "LETTERS_STORAGE",
                    value: other.to_string(),
                    reason: "expected drive, memory or json".to_string(),
                })
            }
        };

        let ownership = match lookup("LETTERS_OWNERSHIP") {
            Some(value) => parse("LETTERS_OWNERSHIP", value)?,
            None => OwnershipPolicy::default(),
        };

        let max_body_bytes = match lookup("LETTERS_MAX_BODY_BYTES") {
            Some(value) => parse("LETTERS_MAX_BODY_BYTES", value)?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        Ok(Self {
            bind_addr: SocketAddr::new(ip, port),
            firebase_project_id,
            storage,
            ownership,
            max_body_bytes,
        })
    }
}

/// First match wins: service account, then refresh token, then a static token.
fn drive_credentials(
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<DriveCredentials, ConfigError> {
    if let Some(path) = lookup("GOOGLE_SERVICE_ACCOUNT_KEY") {
        return Ok(DriveCredentials::ServiceAccountFile(path));
    }
    if let Some(json) = lookup("GOOGLE_SERVICE_ACCOUNT_JSON") {
        return Ok(DriveCredentials::ServiceAccountJson(json));
    }
    if let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
        lookup("GOOGLE_CLIENT_ID"),
        lookup("GOOGLE_CLIENT_SECRET"),
        lookup("GOOGLE_REFRESH_TOKEN"),
    ) {
        return Ok(DriveCredentials::RefreshToken {
            client_id,
            client_secret,
            refresh_token,
        });
    }
    if let Some(token) = lookup("GOOGLE_DRIVE_ACCESS_TOKEN") {
        return Ok(DriveCredentials::AccessToken(token));
    }
    Err(ConfigError::NoDriveCredentials)
}

/// How the command line client reaches the server and signs in.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub firebase_api_key: Option<String>,
    /// Refresh token printed by `login`; renews ID tokens as needed.
    pub refresh_token: Option<String>,
    /// A raw Firebase ID token, used as-is until it expires.
    pub id_token: Option<String>,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_url: lookup("LETTERS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            firebase_api_key: lookup("FIREBASE_API_KEY"),
            refresh_token: lookup("LETTERS_REFRESH_TOKEN"),
            id_token: lookup("LETTERS_ID_TOKEN"),
        }
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.firebase_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("FIREBASE_API_KEY"))
    }
}
