// =============================================================================
// GOOGLE DRIVE LETTER STORE
// =============================================================================
//
// Implements `LetterStore` on top of the Drive v3 REST API. Each trait method
// is exactly one HTTP call (listing follows `nextPageToken`, one call per
// page). Any non-success status becomes a `StoreError`; the HTTP layer maps
// all of them to the same 500 response.
//
// **Endpoints used:**
// - `GET    /drive/v3/files?q=...`                       list
// - `GET    /drive/v3/files/{id}?alt=media`              fetch body
// - `GET    /drive/v3/files/{id}?fields=appProperties`   owner tag
// - `POST   /upload/drive/v3/files?uploadType=multipart` create
// - `PATCH  /upload/drive/v3/files/{id}?uploadType=media` overwrite
// - `DELETE /drive/v3/files/{id}`                        remove

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use super::drive_auth::AccessTokenProvider;
use crate::core::letters::{LetterStore, LetterSummary, ListFilter, NewFile, StoreError};

const GOOGLE_API_BASE: &str = "https://www.googleapis.com";

/// `appProperties` key holding the creator's uid.
const OWNER_PROPERTY: &str = "ownerUid";

// =============================================================================
// DRIVE API RESPONSE STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<LetterSummary>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileProperties {
    #[serde(default)]
    app_properties: HashMap<String, String>,
}

// =============================================================================
// DRIVE CLIENT
// =============================================================================

pub struct GoogleDriveStore {
    client: Client,
    auth: Box<dyn AccessTokenProvider>,
    base_url: String,
}

impl GoogleDriveStore {
    pub fn new(auth: Box<dyn AccessTokenProvider>) -> Self {
        Self::with_base_url(auth, GOOGLE_API_BASE)
    }

    /// Talk to a Drive-compatible server at another address (tests use a mock).
    pub fn with_base_url(auth: Box<dyn AccessTokenProvider>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            auth,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.base_url)
    }

    fn file_url(&self, id: &str) -> Result<Url, StoreError> {
        Self::item_url(&self.files_url(), id)
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/drive/v3/files", self.base_url)
    }

    /// `{collection}/{id}` with `id` escaped as a single path segment, so an
    /// id can only ever name one file.
    fn item_url(collection: &str, id: &str) -> Result<Url, StoreError> {
        if id.is_empty() || id == "." || id == ".." {
            return Err(StoreError::NotFound(format!("invalid file id {:?}", id)));
        }

        let mut url = Url::parse(collection).map_err(|e| StoreError::Backend(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Backend(format!("{} cannot hold a file id", collection)))?
            .push(id);
        Ok(url)
    }

    /// Drive's query language: `q=mimeType='application/json' and trashed=false`.
    fn build_query(filter: &ListFilter) -> String {
        let mut q = format!(
            "mimeType='{}' and trashed=false",
            escape_query_value(&filter.mime_type)
        );
        if let Some(owner) = &filter.owner {
            q.push_str(&format!(
                " and appProperties has {{ key='{}' and value='{}' }}",
                OWNER_PROPERTY,
                escape_query_value(owner)
            ));
        }
        q
    }

    /// Sends a request with a fresh bearer token and turns failures into errors.
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, StoreError> {
        let token = self.auth.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("{}: {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(format!("{}: {}", what, text)));
        }
        Err(StoreError::Backend(format!(
            "Drive API error during {} ({}): {}",
            what, status, text
        )))
    }
}

/// Single quotes and backslashes must be escaped inside Drive query strings.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Builds a `multipart/related` body: JSON metadata first, then the media.
fn multipart_related(metadata: &serde_json::Value, mime_type: &str, body: &[u8]) -> (String, Vec<u8>) {
    let boundary = format!("letters-{:016x}", rand::thread_rng().gen::<u64>());

    let mut out = Vec::with_capacity(body.len() + 256);
    out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    out.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    out.extend_from_slice(metadata.to_string().as_bytes());
    out.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    out.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    (format!("multipart/related; boundary={}", boundary), out)
}

#[async_trait]
impl LetterStore for GoogleDriveStore {
    async fn list(&self, filter: &ListFilter) -> Result<Vec<LetterSummary>, StoreError> {
        let query = Self::build_query(filter);
        let mut letters = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.clone()),
                ("spaces", "drive".to_string()),
                (
                    "fields",
                    "nextPageToken, files(id, name, modifiedTime)".to_string(),
                ),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let response = self
                .send(self.client.get(self.files_url()).query(&params), "list")
                .await?;
            let page: FileList = response
                .json()
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;

            letters.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!("Drive list returned {} file(s)", letters.len());
        Ok(letters)
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let request = self.client.get(self.file_url(id)?).query(&[("alt", "media")]);
        let response = self.send(request, "fetch").await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn create(&self, file: NewFile) -> Result<String, StoreError> {
        let mut metadata = json!({
            "name": file.name,
            "mimeType": file.mime_type,
        });
        if let Some(owner) = &file.owner {
            metadata["appProperties"] = json!({ OWNER_PROPERTY: owner });
        }

        let (content_type, body) = multipart_related(&metadata, &file.mime_type, &file.body);
        let request = self
            .client
            .post(self.upload_url())
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);

        let created: CreatedFile = self
            .send(request, "create")
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(created.id)
    }

    async fn overwrite(&self, id: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let request = self
            .client
            .patch(Self::item_url(&self.upload_url(), id)?)
            .query(&[("uploadType", "media")])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        self.send(request, "overwrite").await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.send(self.client.delete(self.file_url(id)?), "remove")
            .await?;
        Ok(())
    }

    async fn owner_of(&self, id: &str) -> Result<Option<String>, StoreError> {
        let request = self
            .client
            .get(self.file_url(id)?)
            .query(&[("fields", "appProperties")]);
        let mut props: FileProperties = self
            .send(request, "owner lookup")
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(props.app_properties.remove(OWNER_PROPERTY))
    }
}
