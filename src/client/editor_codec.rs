// Conversion between the editor's in-memory state and the raw structure that
// is stored as a letter's `content`.
//
// The server treats `content` as opaque JSON. Only the codec knows its shape.
// `DraftRawCodec` speaks the Draft.js raw format (`blocks` + `entityMap`) so
// letters stay readable by the web editor; it keeps plain text only.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Malformed editor content: {0}")]
pub struct CodecError(String);

pub trait RichTextCodec: Send + Sync {
    type State: Clone + Send + Sync;

    fn empty(&self) -> Self::State;
    fn encode(&self, state: &Self::State) -> Value;
    fn decode(&self, raw: &Value) -> Result<Self::State, CodecError>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlock {
    key: String,
    text: String,
    #[serde(rename = "type", default = "unstyled")]
    block_type: String,
    #[serde(default)]
    depth: u32,
    #[serde(default)]
    inline_style_ranges: Vec<Value>,
    #[serde(default)]
    entity_ranges: Vec<Value>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContent {
    blocks: Vec<RawBlock>,
    #[serde(default)]
    entity_map: Value,
}

fn unstyled() -> String {
    "unstyled".to_string()
}

/// Draft.js block keys: five lowercase base-36 characters.
fn block_key() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..5)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Plain text, one Draft.js block per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct DraftRawCodec;

impl RichTextCodec for DraftRawCodec {
    type State = String;

    fn empty(&self) -> String {
        String::new()
    }

    fn encode(&self, text: &String) -> Value {
        let blocks = text
            .split('\n')
            .map(|line| RawBlock {
                key: block_key(),
                text: line.to_string(),
                block_type: unstyled(),
                depth: 0,
                inline_style_ranges: Vec::new(),
                entity_ranges: Vec::new(),
                data: Value::Object(Default::default()),
            })
            .collect();

        let raw = RawContent {
            blocks,
            entity_map: Value::Object(Default::default()),
        };
        // Serializing plain structs of strings and values cannot fail.
        serde_json::to_value(raw).unwrap_or(Value::Null)
    }

    fn decode(&self, raw: &Value) -> Result<String, CodecError> {
        // Letters saved without content open as an empty editor.
        if raw.is_null() {
            return Ok(self.empty());
        }

        let content: RawContent =
            serde_json::from_value(raw.clone()).map_err(|e| CodecError(e.to_string()))?;
        Ok(content
            .blocks
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
