//! # bucket-search CLI interface
//!
//! Command parsing and the async [`run`] entrypoint. All business logic lives in
//! `bucket-search-core`; this module wires the HTTP clients, credentials and
//! tunables into the two orchestrators.
//!
//! - `sync` indexes every object of a bucket into a datasource.
//! - `purge` deletes every item of a datasource.
//!
//! `run` is exposed for integration tests as well as for `main`.
use crate::auth::{authenticate, SEARCH_SCOPE, STORAGE_SCOPE};
use crate::cloudsearch::CloudSearchClient;
use crate::gcs::GcsClient;
use crate::load_config::{load_config, CliConfig};
use anyhow::{Context, Result};
use bucket_search_core::item_body::ItemBody;
use bucket_search_core::items::ItemsService;
use bucket_search_core::purge::purge;
use bucket_search_core::storage::CloudStorage;
use bucket_search_core::synchronise::{synchronise, SynchroniseReport};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// CLI for bucket-search: index a Cloud Storage bucket into Cloud Search.
#[derive(Parser)]
#[clap(
    name = "bucket-search",
    version,
    about = "Index Cloud Storage objects into a Cloud Search datasource, or purge the datasource"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index every object of a bucket into the datasource
    Sync {
        /// Service-account JSON key file
        #[clap(
            long,
            alias = "service_account_file",
            env = "GOOGLE_APPLICATION_CREDENTIALS"
        )]
        service_account_file: PathBuf,
        /// Datasource id
        #[clap(long)]
        datasources: String,
        /// JSON template every indexed item starts from
        #[clap(long, alias = "item_json")]
        item_json: PathBuf,
        /// Bucket to index
        #[clap(long, alias = "document_bucket")]
        document_bucket: String,
        /// Optional YAML tunables file
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Delete every item of the datasource
    Purge {
        /// Service-account JSON key file
        #[clap(
            long,
            alias = "service_account_file",
            env = "GOOGLE_APPLICATION_CREDENTIALS"
        )]
        service_account_file: PathBuf,
        /// Datasource id
        #[clap(long)]
        datasources: String,
        /// Optional YAML tunables file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Async CLI entrypoint for `main` and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync {
            service_account_file,
            datasources,
            item_json,
            document_bucket,
            config,
        } => {
            let settings = settings_from(config.as_deref())?;
            run_sync(
                &settings,
                &service_account_file,
                &datasources,
                &item_json,
                &document_bucket,
            )
            .await
        }
        Commands::Purge {
            service_account_file,
            datasources,
            config,
        } => {
            let settings = settings_from(config.as_deref())?;
            run_purge(&settings, &service_account_file, &datasources).await
        }
    }
}

fn settings_from(path: Option<&Path>) -> Result<CliConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(CliConfig::default()),
    }
}

fn load_template(path: &Path) -> Result<ItemBody> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read item template {path:?}"))?;
    let value = serde_json::from_str(&raw)
        .with_context(|| format!("Item template {path:?} is not valid JSON"))?;
    Ok(ItemBody::from_template(value)?)
}

async fn items_service(
    settings: &CliConfig,
    credentials: &Path,
    datasource: &str,
) -> Result<ItemsService<CloudSearchClient>> {
    let token = authenticate(credentials, &[SEARCH_SCOPE])
        .await
        .context("Cloud Search authentication failed")?;
    let client = CloudSearchClient::new(settings.search.endpoint.clone(), token);
    Ok(ItemsService::new(client, datasource)
        .with_page_size(settings.search.page_size)
        .with_list_detail(settings.search.list_detail)
        .with_mode(settings.search.mode))
}

/// Index every object of `bucket` into `datasource` and return the per-object report.
///
/// Objects that fail individually are listed in `report.failed`; only setup
/// and listing failures are returned as errors.
pub async fn sync_bucket(
    settings: &CliConfig,
    credentials: &Path,
    datasource: &str,
    item_json: &Path,
    bucket: &str,
) -> Result<SynchroniseReport> {
    let template = load_template(item_json)?;

    let storage_token = authenticate(credentials, &[STORAGE_SCOPE])
        .await
        .context("Cloud Storage authentication failed")?;
    let storage = CloudStorage::new(GcsClient::new(
        settings.storage.endpoint.clone(),
        storage_token,
    ))
    .with_chunk_size(settings.storage.chunk_size);
    let items = items_service(settings, credentials, datasource).await?;

    let sync_config = settings.synchronise_config(bucket);
    sync_config.trace_loaded();

    synchronise(&sync_config, &template, &storage, &items)
        .await
        .map_err(|e| {
            tracing::error!(command = "sync", error = %e, "Synchronisation failed");
            anyhow::Error::new(e).context("Synchronisation failed")
        })
}

async fn run_sync(
    settings: &CliConfig,
    credentials: &Path,
    datasource: &str,
    item_json: &Path,
    bucket: &str,
) -> Result<()> {
    tracing::info!(command = "sync", bucket, datasource, "Starting synchronisation process");
    let report = sync_bucket(settings, credentials, datasource, item_json, bucket).await?;

    tracing::info!(
        command = "sync",
        listed = report.listed,
        indexed = report.indexed.len(),
        skipped_folders = report.skipped_folders.len(),
        failed = report.failed.len(),
        "Synchronisation complete"
    );
    for failure in &report.failed {
        tracing::warn!(
            command = "sync",
            object = %failure.object_name,
            reached = ?failure.reached,
            error = %failure.error,
            "Object was not indexed"
        );
    }
    Ok(())
}

async fn run_purge(settings: &CliConfig, credentials: &Path, datasource: &str) -> Result<()> {
    tracing::info!(command = "purge", datasource, "Starting purge");
    let items = items_service(settings, credentials, datasource).await?;

    match purge(&settings.purge, &items).await {
        Ok(report) => {
            tracing::info!(
                command = "purge",
                deleted = report.deleted.len(),
                failed = report.failed.len(),
                "Purge complete"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = "purge", error = %e, "Purge failed");
            Err(anyhow::Error::new(e).context("Purge failed"))
        }
    }
}
