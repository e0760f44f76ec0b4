use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

pub const DEFAULT_PUBLIC_URL_BASE: &str = "https://storage.googleapis.com";

/// Settings for one ingest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynchroniseConfig {
    /// Bucket to enumerate.
    pub bucket: String,
    /// Base of the public object URL stored as `sourceRepositoryUrl`.
    #[serde(default = "default_public_url_base")]
    pub public_url_base: String,
    /// Parent directory for per-object temporary downloads. Created if missing.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Objects processed at once. 1 keeps the run strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl SynchroniseConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            public_url_base: default_public_url_base(),
            work_dir: default_work_dir(),
            concurrency: default_concurrency(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            bucket = %self.bucket,
            work_dir = %self.work_dir.display(),
            concurrency = self.concurrency,
            "Loaded SynchroniseConfig"
        );
        debug!(?self, "SynchroniseConfig loaded (full debug)");
    }
}

/// Settings for one purge run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurgeConfig {
    /// Keep deleting after a failed delete instead of stopping the run.
    #[serde(default)]
    pub continue_on_error: bool,
}

fn default_public_url_base() -> String {
    DEFAULT_PUBLIC_URL_BASE.to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_concurrency() -> usize {
    1
}
