use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Every letter is stored as a JSON file; listing filters on this type marker.
pub const LETTER_MIME_TYPE: &str = "application/json";

/// The body persisted for a letter.
///
/// `content` is whatever the editor codec produced. The server never looks
/// inside it, so it stays a plain `serde_json::Value`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LetterDocument {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl LetterDocument {
    pub fn new(title: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            title: title.into(),
            content,
        }
    }
}

/// One entry of the letter listing. Field names follow the storage backend's
/// wire format (`modifiedTime`) because the list endpoint passes them through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterSummary {
    pub id: String,
    pub name: String,
    pub modified_time: DateTime<Utc>,
}

/// Who decides whether a caller may touch a letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnershipPolicy {
    /// Trust the storage backend's own access scoping.
    #[default]
    Backend,
    /// Tag files with the creator's uid and check the tag on every access.
    Explicit,
}

impl FromStr for OwnershipPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backend" => Ok(Self::Backend),
            "explicit" => Ok(Self::Explicit),
            other => Err(format!("unknown ownership policy '{}'", other)),
        }
    }
}
