//! # items: Cloud Search item operations for one datasource
//!
//! [`ItemsService`] turns plain item ids into resource names
//! (`datasources/<ds>/items/<id>`), follows listing page tokens, and runs the
//! two-phase media upload:
//!
//! 1. reserve an upload session for `<item name>:upload`
//! 2. transfer the file against that session to obtain a content reference
//! 3. store the reference under `item/content/contentDataRef`, mark the content
//!    `RAW`, then index the item.
//!
//! If step 2 fails the session itself is used as the content reference and a
//! warning is logged. The item is still indexed, possibly with a dangling
//! reference.

use futures::stream::{self, Stream, TryStreamExt};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::contract::{ListDetail, RequestMode, SearchIndexApi};
use crate::error::{Result, SyncError};
use crate::item_body::ItemBody;
use crate::storage::Cursor;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

pub struct ItemsService<A> {
    api: A,
    datasource: String,
    page_size: u32,
    list_detail: ListDetail,
    mode: RequestMode,
}

impl<A: SearchIndexApi> ItemsService<A> {
    pub fn new(api: A, datasource: impl Into<String>) -> Self {
        Self {
            api,
            datasource: datasource.into(),
            page_size: DEFAULT_PAGE_SIZE,
            list_detail: ListDetail::default(),
            mode: RequestMode::default(),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_list_detail(mut self, list_detail: ListDetail) -> Self {
        self.list_detail = list_detail;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn datasource(&self) -> &str {
        &self.datasource
    }

    pub fn datasource_name(&self) -> String {
        format!("datasources/{}", self.datasource)
    }

    pub fn item_name(&self, item_id: &str) -> String {
        format!("datasources/{}/items/{}", self.datasource, item_id)
    }

    pub async fn get_item(&self, item_id: &str) -> Result<Value> {
        let name = self.item_name(item_id);
        debug!(item = %name, "Fetching item");
        self.api.get_item(&name).await
    }

    /// Lazily yields every item of the datasource, one page at a time.
    ///
    /// The stream is finite and cannot be restarted.
    pub fn item_stream(&self) -> impl Stream<Item = Result<Value>> + '_ {
        let datasource_name = self.datasource_name();
        stream::try_unfold((Cursor::Start, 0usize), move |(cursor, page_index)| {
            let datasource_name = datasource_name.clone();
            async move {
                let page_token = match cursor {
                    Cursor::Start => None,
                    Cursor::Next(token) => Some(token),
                    Cursor::Done => return Ok(None),
                };
                let brief = self.list_detail.brief_for_page(page_index);
                debug!(datasource = %datasource_name, page = page_index, brief, "Listing index page");
                let page = self
                    .api
                    .list_items_page(&datasource_name, page_token, self.page_size, brief)
                    .await
                    .map_err(|e| {
                        error!(datasource = %datasource_name, page = page_index, error = ?e, "Failed to list index page");
                        e
                    })?;
                let next = Cursor::after(page.next_page_token);
                Ok::<_, SyncError>(Some((
                    stream::iter(page.items.into_iter().map(Ok::<Value, SyncError>)),
                    (next, page_index + 1),
                )))
            }
        })
        .try_flatten()
    }

    pub async fn list_items(&self) -> Result<Vec<Value>> {
        let items: Vec<Value> = self.item_stream().try_collect().await?;
        info!(datasource = %self.datasource, count = items.len(), "Listed index items");
        Ok(items)
    }

    /// Index the full document under `item_id`.
    ///
    /// `mode` is added only when the document does not already carry one.
    pub async fn insert_item(&self, item_id: &str, body: &mut ItemBody) -> Result<Value> {
        if body.try_get("mode").is_none() {
            body.set("mode", self.mode.as_str());
        }
        let name = self.item_name(item_id);
        info!(item = %name, "Indexing item");
        self.api.index_item(&name, body.body()).await.map_err(|e| {
            error!(item = %name, error = ?e, "Failed to index item");
            e
        })
    }

    pub async fn insert_item_with_media(
        &self,
        item_id: &str,
        body: &mut ItemBody,
        media_file: &Path,
    ) -> Result<Value> {
        let name = self.item_name(item_id);
        let session = self
            .api
            .start_upload(&format!("{name}:upload"))
            .await
            .map_err(|e| {
                error!(item = %name, error = ?e, "Failed to reserve upload session");
                match e {
                    upload @ SyncError::Upload(_) => upload,
                    other => SyncError::Upload(other.to_string()),
                }
            })?;
        debug!(item = %name, session = %session.name, "Reserved upload session");

        let content = tokio::fs::read(media_file)
            .await
            .map_err(|e| SyncError::io(media_file, e))?;

        let content_ref = match self.api.upload_media(&session, &content).await {
            Ok(content_ref) => content_ref,
            Err(e) => {
                warn!(
                    item = %name,
                    session = %session.name,
                    error = ?e,
                    "Media upload failed, falling back to the session as content reference"
                );
                serde_json::to_value(&session).map_err(|e| SyncError::Encoding(e.to_string()))?
            }
        };

        body.set("item/content/contentDataRef", content_ref);
        body.set("item/content/contentFormat", "RAW");
        body.set("item/content/hash", sha256_hex(&content));
        self.insert_item(item_id, body).await
    }

    /// Remove one item. `name` and `version` are taken as reported by a listing.
    pub async fn delete_item(&self, name: &str, version: &str) -> Result<Value> {
        self.delete_item_with_mode(name, version, RequestMode::Synchronous)
            .await
    }

    pub async fn delete_item_with_mode(
        &self,
        name: &str,
        version: &str,
        mode: RequestMode,
    ) -> Result<Value> {
        info!(item = %name, mode = mode.as_str(), "Deleting item");
        self.api.delete_item(name, version, mode).await
    }

    /// Ask the index to reprocess an existing item.
    pub async fn push_item(&self, item_id: &str, body: &Value) -> Result<Value> {
        let name = self.item_name(item_id);
        info!(item = %name, "Pushing item");
        self.api.push_item(&name, body).await
    }
}

fn sha256_hex(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}
