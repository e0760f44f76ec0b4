//! Bucket listing and object download on top of [`StorageApi`].

use futures::stream::{self, Stream, TryStreamExt};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::contract::{BucketObject, StorageApi};
use crate::error::{Result, SyncError};

/// Default byte range requested per download round trip (1 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Position in a paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cursor {
    Start,
    Next(String),
    Done,
}

impl Cursor {
    pub(crate) fn after(next_page_token: Option<String>) -> Self {
        match next_page_token {
            Some(token) if !token.is_empty() => Cursor::Next(token),
            _ => Cursor::Done,
        }
    }
}

pub struct CloudStorage<S> {
    api: S,
    chunk_size: u64,
}

impl<S: StorageApi> CloudStorage<S> {
    pub fn new(api: S) -> Self {
        Self {
            api,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn api(&self) -> &S {
        &self.api
    }

    /// Lazily yields every object of `bucket`, one listing page at a time.
    ///
    /// The stream is finite and cannot be restarted.
    pub fn object_stream<'a>(
        &'a self,
        bucket: &'a str,
    ) -> impl Stream<Item = Result<BucketObject>> + 'a {
        stream::try_unfold(Cursor::Start, move |cursor| async move {
            let page_token = match cursor {
                Cursor::Start => None,
                Cursor::Next(token) => Some(token),
                Cursor::Done => return Ok(None),
            };
            debug!(bucket, page_token = ?page_token, "Listing bucket page");
            let page = self
                .api
                .list_objects_page(bucket, page_token)
                .await
                .map_err(|e| {
                    error!(bucket, error = ?e, "Failed to list bucket page");
                    e
                })?;
            let next = Cursor::after(page.next_page_token);
            Ok::<_, SyncError>(Some((
                stream::iter(page.items.into_iter().map(Ok::<BucketObject, SyncError>)),
                next,
            )))
        })
        .try_flatten()
    }

    /// Collects the whole listing in memory.
    pub async fn list_objects(&self, bucket: &str) -> Result<Vec<BucketObject>> {
        let objects: Vec<BucketObject> = self.object_stream(bucket).try_collect().await?;
        info!(bucket, count = objects.len(), "Listed bucket objects");
        Ok(objects)
    }

    /// Streams `object` into `dest_dir/<base name>`, overwriting any existing file.
    ///
    /// Partial files are left in place on failure.
    pub async fn download_object(&self, object: &BucketObject, dest_dir: &Path) -> Result<PathBuf> {
        let file_name = base_name(&object.name);
        if file_name.is_empty() {
            return Err(SyncError::download(
                &object.name,
                "object name has no base name",
            ));
        }
        let path = dest_dir.join(file_name);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| SyncError::io(&path, e))?;

        let mut offset: u64 = 0;
        loop {
            let chunk = self
                .api
                .fetch_media_chunk(&object.bucket, &object.name, offset, self.chunk_size)
                .await?;
            let received = chunk.data.len() as u64;
            file.write_all(&chunk.data)
                .await
                .map_err(|e| SyncError::io(&path, e))?;
            offset += received;

            let done = match chunk.total_size {
                Some(total) => offset >= total,
                None => received < self.chunk_size,
            } || received == 0;

            if let Some(total) = chunk.total_size.filter(|t| *t > 0) {
                debug!(
                    object = %object.name,
                    progress = offset * 100 / total,
                    "Download progress"
                );
            }
            if done {
                break;
            }
        }
        file.flush().await.map_err(|e| SyncError::io(&path, e))?;
        info!(object = %object.name, bytes = offset, path = %path.display(), "Downloaded object");
        Ok(path)
    }
}

/// Last `/`-separated segment of an object key. Empty for folder placeholders.
pub fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Everything before the last `/`, or `""` for top-level objects.
pub fn parent_folder(name: &str) -> &str {
    name.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// A listing entry that only stands for a folder.
pub fn is_folder_placeholder(object: &BucketObject) -> bool {
    base_name(&object.name).is_empty()
}
