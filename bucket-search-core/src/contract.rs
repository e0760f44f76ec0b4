//! # contract: the remote API seams
//!
//! Two traits describe the raw calls this crate needs from the outside world:
//! - [`StorageApi`]: one page of a bucket listing, one byte range of an object.
//! - [`SearchIndexApi`]: the Cloud Search indexing endpoints, one call each.
//!
//! Pagination, chunked download loops, item naming and the upload fallback all
//! live above these traits (see [`crate::storage`] and [`crate::items`]), so
//! the real HTTP clients stay thin and the orchestration can be tested with
//! `mockall` mocks.
//!
//! ## Mocking & Testing
//! - Both traits are annotated with `automock`, exported when the
//!   `test-export-mocks` feature is on (the default), so the CLI crate and the
//!   integration tests can build `MockStorageApi` / `MockSearchIndexApi`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Remote object descriptor as returned by a bucket listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketObject {
    /// Full path-like key, e.g. `docs/readme.txt`. Folder placeholders end in `/`.
    pub name: String,
    /// Opaque unique id. May contain `/`.
    pub id: String,
    pub bucket: String,
    /// Decimal byte count, as the storage API reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// One page of a bucket listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPage {
    #[serde(default)]
    pub items: Vec<BucketObject>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// One byte range of an object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaChunk {
    pub data: Vec<u8>,
    /// Full object size when the server reported it.
    pub total_size: Option<u64>,
}

/// One page of an index listing. Items are kept as raw documents.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsPage {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Handle returned when reserving a media upload slot. Consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSession {
    pub name: String,
}

/// Indexing request mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestMode {
    #[default]
    #[serde(alias = "synchronous")]
    Synchronous,
    #[serde(alias = "asynchronous")]
    Asynchronous,
}

impl RequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Synchronous => "SYNCHRONOUS",
            RequestMode::Asynchronous => "ASYNCHRONOUS",
        }
    }
}

/// How much detail to request from each page of an index listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListDetail {
    /// Full items on every page.
    #[default]
    Full,
    /// Brief items on every page.
    Brief,
    /// Full items on the first page, brief afterwards.
    FirstPageFull,
}

impl ListDetail {
    /// Value of the `brief` flag for the zero-based page `page_index`.
    pub fn brief_for_page(&self, page_index: usize) -> bool {
        match self {
            ListDetail::Full => false,
            ListDetail::Brief => true,
            ListDetail::FirstPageFull => page_index > 0,
        }
    }
}

/// Raw object store calls.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait StorageApi: Send + Sync {
    /// Fetch one page of the bucket listing. `page_token` is `None` for the first page.
    async fn list_objects_page(&self, bucket: &str, page_token: Option<String>)
        -> Result<ObjectPage>;

    /// Fetch `len` bytes of `object_name` starting at `offset`.
    ///
    /// A chunk shorter than `len` means the end of the object was reached.
    async fn fetch_media_chunk(
        &self,
        bucket: &str,
        object_name: &str,
        offset: u64,
        len: u64,
    ) -> Result<MediaChunk>;
}

/// Raw Cloud Search indexing calls. Every `name` is a full resource name,
/// e.g. `datasources/abc/items/xyz`.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait SearchIndexApi: Send + Sync {
    async fn list_items_page(
        &self,
        datasource_name: &str,
        page_token: Option<String>,
        page_size: u32,
        brief: bool,
    ) -> Result<ItemsPage>;

    async fn get_item(&self, name: &str) -> Result<Value>;

    /// Submit a full item document.
    async fn index_item(&self, name: &str, body: &Value) -> Result<Value>;

    async fn push_item(&self, name: &str, body: &Value) -> Result<Value>;

    async fn delete_item(&self, name: &str, version: &str, mode: RequestMode) -> Result<Value>;

    /// Reserve an upload session. `name` is the full upload resource,
    /// suffix included, e.g. `datasources/abc/items/xyz:upload`.
    async fn start_upload(&self, name: &str) -> Result<UploadSession>;

    /// Transfer the file's bytes against `session`, returning the content reference.
    async fn upload_media(&self, session: &UploadSession, content: &[u8]) -> Result<Value>;
}
