/// `load_config` module: loads the optional YAML tunables file and maps it onto the
/// run configurations of `bucket-search-core`.
///
/// Every key is optional. A missing section, or no file at all, falls back to
/// the production endpoints and the sequential defaults. Credentials never live
/// in this file; they come from the service-account key given on the command line.
///
/// # Errors
/// Read and parse failures are `anyhow::Error` with the path attached, surfaced
/// at the CLI boundary.
use anyhow::{Context, Result};
use bucket_search_core::config::{PurgeConfig, SynchroniseConfig, DEFAULT_PUBLIC_URL_BASE};
use bucket_search_core::contract::{ListDetail, RequestMode};
use bucket_search_core::items::DEFAULT_PAGE_SIZE;
use bucket_search_core::storage::DEFAULT_CHUNK_SIZE;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::cloudsearch::DEFAULT_SEARCH_ENDPOINT;
use crate::gcs::DEFAULT_STORAGE_ENDPOINT;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub storage: StorageSection,
    pub search: SearchSection,
    pub sync: SyncSection,
    pub purge: PurgeConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub endpoint: String,
    pub public_url_base: String,
    pub chunk_size: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
            public_url_base: DEFAULT_PUBLIC_URL_BASE.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSection {
    pub endpoint: String,
    pub page_size: u32,
    pub list_detail: ListDetail,
    pub mode: RequestMode,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            list_detail: ListDetail::default(),
            mode: RequestMode::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSection {
    pub work_dir: PathBuf,
    pub concurrency: usize,
}

impl Default for SyncSection {
    fn default() -> Self {
        let defaults = SynchroniseConfig::new("");
        Self {
            work_dir: defaults.work_dir,
            concurrency: defaults.concurrency,
        }
    }
}

impl CliConfig {
    /// Ingest settings for `bucket`.
    pub fn synchronise_config(&self, bucket: &str) -> SynchroniseConfig {
        let mut config = SynchroniseConfig::new(bucket);
        config.public_url_base = self.storage.public_url_base.clone();
        config.work_dir = self.sync.work_dir.clone();
        config.concurrency = self.sync.concurrency;
        config
    }
}

/// Loads the YAML tunables file at `path`. An empty file yields the defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref)
        .inspect_err(|e| error!(error = ?e, config_path = ?path_ref, "Failed to read config file"))
        .with_context(|| format!("Failed to read config file {path_ref:?}"))?;

    if config_content.trim().is_empty() {
        info!(config_path = ?path_ref, "Config file is empty, using defaults");
        return Ok(CliConfig::default());
    }

    let config: CliConfig = serde_yaml::from_str(&config_content)
        .inspect_err(|e| error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML"))
        .with_context(|| format!("Failed to parse config YAML {path_ref:?}"))?;

    if config.sync.concurrency == 0 {
        anyhow::bail!("sync.concurrency must be at least 1");
    }
    if config.storage.chunk_size == 0 {
        anyhow::bail!("storage.chunk_size must be at least 1");
    }
    if config.search.page_size == 0 {
        anyhow::bail!("search.page_size must be at least 1");
    }

    info!(config_path = ?path_ref, "Parsed config YAML successfully");
    Ok(config)
}
