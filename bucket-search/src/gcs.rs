//! Cloud Storage JSON API client backing [`StorageApi`].

use crate::auth::AccessToken;
use async_trait::async_trait;
use bucket_search_core::contract::{MediaChunk, ObjectPage, StorageApi};
use bucket_search_core::{Result, SyncError};
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use tracing::{debug, error};

pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

pub struct GcsClient {
    http: reqwest::Client,
    endpoint: String,
    token: AccessToken,
}

impl GcsClient {
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

    fn objects_url(&self, bucket: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o",
            self.endpoint,
            urlencoding::encode(bucket)
        )
    }
}

/// Total object size from a `Content-Range` value such as `bytes 0-9/25` or `bytes */25`.
pub fn total_from_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl StorageApi for GcsClient {
    async fn list_objects_page(
        &self,
        bucket: &str,
        page_token: Option<String>,
    ) -> Result<ObjectPage> {
        let mut request = self
            .http
            .get(self.objects_url(bucket))
            .bearer_auth(self.token.secret());
        if let Some(token) = &page_token {
            request = request.query(&[("pageToken", token.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::RemoteList(format!("bucket {bucket}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(bucket, %status, body = %body, "Bucket listing rejected");
            return Err(SyncError::RemoteList(format!("bucket {bucket}: HTTP {status}: {body}")));
        }
        response
            .json::<ObjectPage>()
            .await
            .map_err(|e| SyncError::RemoteList(format!("bucket {bucket}: invalid listing: {e}")))
    }

    async fn fetch_media_chunk(
        &self,
        bucket: &str,
        object_name: &str,
        offset: u64,
        len: u64,
    ) -> Result<MediaChunk> {
        let url = format!(
            "{}/{}",
            self.objects_url(bucket),
            urlencoding::encode(object_name)
        );
        let end = offset + len.max(1) - 1;
        debug!(bucket, object = object_name, offset, end, "Requesting media range");

        let response = self
            .http
            .get(url)
            .query(&[("alt", "media")])
            .bearer_auth(self.token.secret())
            .header(RANGE, format!("bytes={offset}-{end}"))
            .send()
            .await
            .map_err(|e| SyncError::download(object_name, e.to_string()))?;

        let status = response.status();
        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(total_from_content_range);

        match status {
            StatusCode::PARTIAL_CONTENT => {
                let data = response
                    .bytes()
                    .await
                    .map_err(|e| SyncError::download(object_name, e.to_string()))?;
                Ok(MediaChunk {
                    data: data.to_vec(),
                    total_size: content_range,
                })
            }
            // The server ignored the range and sent the whole object.
            StatusCode::OK => {
                let data = response
                    .bytes()
                    .await
                    .map_err(|e| SyncError::download(object_name, e.to_string()))?;
                let rest = data.get(offset as usize..).unwrap_or_default();
                Ok(MediaChunk {
                    data: rest.to_vec(),
                    total_size: Some(data.len() as u64),
                })
            }
            StatusCode::RANGE_NOT_SATISFIABLE => Ok(MediaChunk {
                data: Vec::new(),
                total_size: Some(content_range.unwrap_or(offset)),
            }),
            _ => {
                let body = response.text().await.unwrap_or_default();
                error!(bucket, object = object_name, %status, "Media download rejected");
                Err(SyncError::download(object_name, format!("HTTP {status}: {body}")))
            }
        }
    }
}
