//! High-level ingest pipeline: bucket objects → Cloud Search items.
//!
//! Each listed object walks the states of [`ObjectState`]:
//! `Listed → Downloaded → DocumentBuilt → Uploaded → CleanedUp`.
//!
//! # Responsibilities
//! - Enumerate the bucket once, skipping folder placeholders entirely
//! - Download each object into its own temporary directory under `work_dir`
//! - Build the item document from a fresh copy of the template plus object metadata
//! - Upload through [`ItemsService::insert_item_with_media`]
//! - Remove the temporary file, on success and on failure
//!
//! # Error Handling
//! A failed listing aborts the run. A failure on a single object is logged,
//! recorded in the report with the last state reached, and the run moves on to
//! the next object. Nothing is retried.
//!
//! # Concurrency
//! `SynchroniseConfig::concurrency` objects are in flight at once; the report
//! keeps listing order.

use base64::Engine;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde_json::json;
use tracing::{error, info};

use crate::config::SynchroniseConfig;
use crate::contract::{BucketObject, SearchIndexApi, StorageApi};
use crate::error::{Result, SyncError};
use crate::item_body::ItemBody;
use crate::items::ItemsService;
use crate::storage::{base_name, is_folder_placeholder, parent_folder, CloudStorage};

/// Pipeline position of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    Listed,
    Downloaded,
    DocumentBuilt,
    Uploaded,
    CleanedUp,
}

#[derive(Debug, Default)]
pub struct SynchroniseReport {
    /// Entries returned by the listing, placeholders included.
    pub listed: usize,
    pub skipped_folders: Vec<String>,
    pub indexed: Vec<ObjectReport>,
    pub failed: Vec<FailedObjectReport>,
}

#[derive(Debug, Clone)]
pub struct ObjectReport {
    pub object_name: String,
    pub item_id: String,
    /// Always [`ObjectState::CleanedUp`] for an indexed object.
    pub state: ObjectState,
}

#[derive(Debug, Clone)]
pub struct FailedObjectReport {
    pub object_name: String,
    /// Last state the object reached before the failing step.
    pub reached: ObjectState,
    pub error: String,
}

/// An item document ready for upload.
#[derive(Debug, Clone)]
pub struct PreparedItem {
    pub item_id: String,
    pub body: ItemBody,
}

/// Item id for an object: its opaque id with every `/` removed.
///
/// Ids that differ only by separators collide.
pub fn derive_item_id(object_id: &str) -> String {
    object_id.replace('/', "")
}

/// Version stamp: base64 of the decimal unix timestamp.
pub fn version_stamp(indexed_at: DateTime<Utc>) -> String {
    base64::engine::general_purpose::STANDARD.encode(indexed_at.timestamp().to_string())
}

/// Public URL of an object; the whole key is percent-encoded, `/` included.
pub fn source_url(public_url_base: &str, bucket: &str, object_name: &str) -> String {
    format!(
        "{}/{}/{}",
        public_url_base.trim_end_matches('/'),
        bucket,
        urlencoding::encode(object_name)
    )
}

/// Builds the item document for `object` from a copy of `template`.
pub fn prepare_item(
    template: &ItemBody,
    object: &BucketObject,
    config: &SynchroniseConfig,
    indexed_at: DateTime<Utc>,
) -> Result<PreparedItem> {
    let file_name = base_name(&object.name);
    if file_name.is_empty() {
        return Err(SyncError::Config(format!(
            "{} is a folder placeholder",
            object.name
        )));
    }
    let mut body = template.clone();
    body.set_bytes("item/version", version_stamp(indexed_at).as_bytes())?;
    body.set("item/metadata/title", file_name);
    body.set("item/metadata/objectType", "document");
    body.set(
        "item/metadata/sourceRepositoryUrl",
        source_url(&config.public_url_base, &config.bucket, &object.name),
    );
    body.set(
        "item/structuredData/object/properties",
        json!([{
            "name": "author",
            "textValues": { "values": [parent_folder(&object.name)] }
        }]),
    );
    Ok(PreparedItem {
        item_id: derive_item_id(&object.id),
        body,
    })
}

pub async fn synchronise<S, A>(
    config: &SynchroniseConfig,
    template: &ItemBody,
    storage: &CloudStorage<S>,
    items: &ItemsService<A>,
) -> Result<SynchroniseReport>
where
    S: StorageApi,
    A: SearchIndexApi,
{
    info!(bucket = %config.bucket, datasource = %items.datasource(), "[SYNC] Indexing documents - START");

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .map_err(|e| SyncError::io(&config.work_dir, e))?;

    let objects = storage.list_objects(&config.bucket).await.map_err(|e| {
        error!(bucket = %config.bucket, error = ?e, "[SYNC][ERROR] Failed to list bucket");
        e
    })?;

    let mut report = SynchroniseReport {
        listed: objects.len(),
        ..Default::default()
    };

    let mut candidates = Vec::with_capacity(objects.len());
    for object in objects {
        if is_folder_placeholder(&object) {
            info!(object = %object.name, "[SYNC] Skipping folder placeholder");
            report.skipped_folders.push(object.name);
        } else {
            candidates.push(object);
        }
    }

    let outcomes: Vec<std::result::Result<ObjectReport, FailedObjectReport>> =
        stream::iter(candidates)
            .map(|object| sync_object(config, template, storage, items, object))
            .buffered(config.concurrency.max(1))
            .collect()
            .await;

    for outcome in outcomes {
        match outcome {
            Ok(done) => report.indexed.push(done),
            Err(failed) => report.failed.push(failed),
        }
    }

    info!(
        indexed = report.indexed.len(),
        failed = report.failed.len(),
        skipped = report.skipped_folders.len(),
        "[SYNC] Indexing documents - END"
    );
    Ok(report)
}

async fn sync_object<S, A>(
    config: &SynchroniseConfig,
    template: &ItemBody,
    storage: &CloudStorage<S>,
    items: &ItemsService<A>,
    object: BucketObject,
) -> std::result::Result<ObjectReport, FailedObjectReport>
where
    S: StorageApi,
    A: SearchIndexApi,
{
    info!(object = %object.name, "[SYNC] Processing file - START");

    // Dropping the directory removes whatever a failed step left behind.
    let temp_dir = tempfile::Builder::new()
        .prefix("object-")
        .tempdir_in(&config.work_dir)
        .map_err(|e| {
            failed(
                &object,
                ObjectState::Listed,
                SyncError::io(&config.work_dir, e),
            )
        })?;

    let local_file = storage
        .download_object(&object, temp_dir.path())
        .await
        .map_err(|e| failed(&object, ObjectState::Listed, e))?;

    let PreparedItem { item_id, mut body } = prepare_item(template, &object, config, Utc::now())
        .map_err(|e| failed(&object, ObjectState::Downloaded, e))?;

    items
        .insert_item_with_media(&item_id, &mut body, &local_file)
        .await
        .map_err(|e| failed(&object, ObjectState::DocumentBuilt, e))?;

    tokio::fs::remove_file(&local_file)
        .await
        .map_err(|e| failed(&object, ObjectState::Uploaded, SyncError::io(&local_file, e)))?;
    let temp_path = temp_dir.path().to_path_buf();
    temp_dir
        .close()
        .map_err(|e| failed(&object, ObjectState::Uploaded, SyncError::io(temp_path, e)))?;

    info!(object = %object.name, item_id = %item_id, "[SYNC] Processing file - END");
    Ok(ObjectReport {
        object_name: object.name,
        item_id,
        state: ObjectState::CleanedUp,
    })
}

fn failed(object: &BucketObject, reached: ObjectState, error: SyncError) -> FailedObjectReport {
    error!(
        object = %object.name,
        reached = ?reached,
        error = ?error,
        "[SYNC][ERROR] Processing file failed"
    );
    FailedObjectReport {
        object_name: object.name.clone(),
        reached,
        error: error.to_string(),
    }
}
