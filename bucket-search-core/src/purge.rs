//! Delete every item of a datasource.
//!
//! The full listing is fetched first, then each item is deleted with the
//! name and version the listing reported. By default the first failed delete
//! stops the run; [`PurgeConfig::continue_on_error`] records it and moves on.

use serde_json::Value;
use tracing::{error, info};

use crate::config::PurgeConfig;
use crate::contract::SearchIndexApi;
use crate::error::{Result, SyncError};
use crate::items::ItemsService;

#[derive(Debug, Default)]
pub struct PurgeReport {
    pub deleted: Vec<String>,
    pub failed: Vec<FailedDelete>,
}

#[derive(Debug, Clone)]
pub struct FailedDelete {
    pub name: String,
    pub error: String,
}

pub async fn purge<A: SearchIndexApi>(
    config: &PurgeConfig,
    items: &ItemsService<A>,
) -> Result<PurgeReport> {
    info!(datasource = %items.datasource(), "[PURGE] Delete documents - START");
    let listed = items.list_items().await?;
    let mut report = PurgeReport::default();

    for item in &listed {
        match delete_listed(items, item).await {
            Ok(name) => {
                info!(item = %name, "[PURGE] Document deleted");
                report.deleted.push(name);
            }
            Err(e) if config.continue_on_error => {
                let name = field(item, "name").unwrap_or("<unnamed>").to_string();
                error!(item = %name, error = ?e, "[PURGE][ERROR] Delete failed, continuing");
                report.failed.push(FailedDelete {
                    name,
                    error: e.to_string(),
                });
            }
            Err(e) => {
                error!(error = ?e, "[PURGE][ERROR] Delete failed, stopping");
                return Err(e);
            }
        }
    }

    info!(
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "[PURGE] Delete documents - END"
    );
    Ok(report)
}

async fn delete_listed<A: SearchIndexApi>(items: &ItemsService<A>, item: &Value) -> Result<String> {
    let name = field(item, "name")
        .ok_or_else(|| SyncError::IndexDelete(format!("listed item has no name: {item}")))?;
    let version = field(item, "version")
        .ok_or_else(|| SyncError::IndexDelete(format!("item {name} has no version")))?;
    items.delete_item(name, version).await?;
    Ok(name.to_string())
}

fn field<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key).and_then(Value::as_str)
}
