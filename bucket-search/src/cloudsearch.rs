//! Cloud Search indexing API client backing [`SearchIndexApi`].
//!
//! Each trait method is a single HTTP call. Resource names such as
//! `datasources/abc/items/xyz` are appended to `{endpoint}/v1/indexing/` as
//! path segments; media bytes go to the separate `upload/v1/media` route.
//! Non-2xx responses become the [`SyncError`] variant matching the call, with
//! the status and response text as the message.

use crate::auth::AccessToken;
use async_trait::async_trait;
use bucket_search_core::contract::{ItemsPage, RequestMode, SearchIndexApi, UploadSession};
use bucket_search_core::{Result, SyncError};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://cloudsearch.googleapis.com";

pub struct CloudSearchClient {
    http: reqwest::Client,
    endpoint: String,
    token: AccessToken,
}

impl CloudSearchClient {
    pub fn new(endpoint: impl Into<String>, token: AccessToken) -> Self {
        Self::with_http(reqwest::Client::new(), endpoint, token)
    }

    pub fn with_http(http: reqwest::Client, endpoint: impl Into<String>, token: AccessToken) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn indexing_url(&self, resource: &str) -> String {
        format!("{}/v1/indexing/{}", self.endpoint, resource)
    }

    fn media_url(&self, session: &UploadSession) -> String {
        format!("{}/upload/v1/media/{}", self.endpoint, session.name)
    }
}

/// Read a JSON response, mapping failures through `kind`.
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Result<reqwest::Response>,
    call: &str,
    kind: fn(String) -> SyncError,
) -> Result<T> {
    let response = response.map_err(|e| kind(format!("{call}: {e}")))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| kind(format!("{call}: {e}")))?;
    if !status.is_success() {
        error!(call, %status, body = %text, "Cloud Search request rejected");
        return Err(kind(format!("{call}: HTTP {status}: {text}")));
    }
    // Some calls answer 200 with an empty body.
    let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
    serde_json::from_str(text).map_err(|e| kind(format!("{call}: invalid response: {e}")))
}

#[async_trait]
impl SearchIndexApi for CloudSearchClient {
    async fn list_items_page(
        &self,
        datasource_name: &str,
        page_token: Option<String>,
        page_size: u32,
        brief: bool,
    ) -> Result<ItemsPage> {
        let mut query = vec![
            ("pageSize", page_size.to_string()),
            ("brief", brief.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        debug!(datasource = datasource_name, page_size, brief, "Listing items page");
        let response = self
            .http
            .get(self.indexing_url(&format!("{datasource_name}/items")))
            .bearer_auth(self.token.secret())
            .query(&query)
            .send()
            .await;
        read_json(response, "items.list", SyncError::RemoteList).await
    }

    async fn get_item(&self, name: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.indexing_url(name))
            .bearer_auth(self.token.secret())
            .send()
            .await;
        read_json(response, "items.get", SyncError::IndexRead).await
    }

    async fn index_item(&self, name: &str, body: &Value) -> Result<Value> {
        let response = self
            .http
            .post(self.indexing_url(&format!("{name}:index")))
            .bearer_auth(self.token.secret())
            .json(body)
            .send()
            .await;
        read_json(response, "items.index", SyncError::IndexWrite).await
    }

    async fn push_item(&self, name: &str, body: &Value) -> Result<Value> {
        let response = self
            .http
            .post(self.indexing_url(&format!("{name}:push")))
            .bearer_auth(self.token.secret())
            .json(body)
            .send()
            .await;
        read_json(response, "items.push", SyncError::IndexWrite).await
    }

    async fn delete_item(&self, name: &str, version: &str, mode: RequestMode) -> Result<Value> {
        let response = self
            .http
            .delete(self.indexing_url(name))
            .bearer_auth(self.token.secret())
            .query(&[("version", version), ("mode", mode.as_str())])
            .send()
            .await;
        read_json(response, "items.delete", SyncError::IndexDelete).await
    }

    async fn start_upload(&self, name: &str) -> Result<UploadSession> {
        let response = self
            .http
            .post(self.indexing_url(name))
            .bearer_auth(self.token.secret())
            .json(&json!({}))
            .send()
            .await;
        read_json(response, "items.upload", SyncError::Upload).await
    }

    async fn upload_media(&self, session: &UploadSession, content: &[u8]) -> Result<Value> {
        debug!(session = %session.name, bytes = content.len(), "Uploading media");
        let response = self
            .http
            .post(self.media_url(session))
            .bearer_auth(self.token.secret())
            .query(&[("uploadType", "media")])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(content.to_vec())
            .send()
            .await;
        read_json(response, "media.upload", SyncError::Upload).await
    }
}
