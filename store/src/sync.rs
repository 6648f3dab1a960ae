//! Third-party sync. The remote exchange itself is delegated to a
//! [`RemoteSync`] implementation; this module only drives the store and the
//! persisted sync status around it.

use crate::error::StoreError;
use crate::store::PromptStore;
use crate::store::SaveReport;
use crate::types::NotionConfig;
use crate::types::Prompt;
use crate::types::StorageType;
use crate::types::SyncStatus;

pub type RemoteError = Box<dyn std::error::Error + Send + Sync>;

pub trait RemoteSync {
    /// Send the current prompts and return the list to keep locally.
    fn exchange(&self, config: &NotionConfig, prompts: &[Prompt]) -> Result<Vec<Prompt>, RemoteError>;
}

/// Run one sync round and record the outcome in `syncStatus`.
///
/// On failure `inProgress` is cleared, `error` holds the message and
/// `lastSynced` keeps its previous value.
pub fn sync_with_remote(
    store: &mut PromptStore,
    remote: &dyn RemoteSync,
    now_ms: i64,
) -> Result<SaveReport, StoreError> {
    let last_synced = store.sync_status().ok().and_then(|s| s.last_synced);
    match run_sync(store, remote, now_ms) {
        Ok(report) => Ok(report),
        Err(err) => {
            let status = SyncStatus {
                last_synced,
                in_progress: false,
                error: Some(err.to_string()),
            };
            if let Err(status_err) = store.set_sync_status(&status) {
                tracing::warn!(error = %status_err, "failed to record sync failure");
            }
            tracing::warn!(error = %err, "sync failed");
            Err(err)
        }
    }
}

fn run_sync(
    store: &mut PromptStore,
    remote: &dyn RemoteSync,
    now_ms: i64,
) -> Result<SaveReport, StoreError> {
    store.load()?;
    let config = store
        .notion_config()?
        .filter(|c| !c.api_key.trim().is_empty())
        .ok_or(StoreError::SyncNotConfigured)?;

    let mut status = store.sync_status()?;
    status.in_progress = true;
    status.error = None;
    store.set_sync_status(&status)?;

    let updated = remote
        .exchange(&config, store.prompts())
        .map_err(StoreError::Remote)?;
    let report = store.save(updated, StorageType::Notion)?;

    store.set_sync_status(&SyncStatus {
        last_synced: Some(now_ms),
        in_progress: false,
        error: None,
    })?;
    tracing::info!(prompts = store.prompts().len(), "sync complete");
    Ok(report)
}
