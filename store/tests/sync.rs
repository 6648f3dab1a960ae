use std::cell::RefCell;

use pretty_assertions::assert_eq;
use promptkeep_store::Prompt;
use promptkeep_store::PromptStore;
use promptkeep_store::StorageType;
use promptkeep_store::StoreConfig;
use promptkeep_store::StoreError;
use promptkeep_store::sync::RemoteError;
use promptkeep_store::sync::RemoteSync;
use promptkeep_store::sync::sync_with_remote;
use promptkeep_store::types::NotionConfig;
use promptkeep_store::types::SyncStatus;

fn sample(id: &str, content: &str) -> Prompt {
    Prompt {
        id: id.to_string(),
        title: format!("title-{id}"),
        content: content.to_string(),
        tags: vec![],
        created_at: 0,
        updated_at: 0,
    }
}

fn notion() -> NotionConfig {
    NotionConfig {
        api_key: "secret_abc".into(),
        page_id: "page-1".into(),
    }
}

/// Appends one remote-only prompt to whatever it receives.
#[derive(Default)]
struct AppendingRemote {
    seen: RefCell<Vec<String>>,
}

impl RemoteSync for AppendingRemote {
    fn exchange(&self, config: &NotionConfig, prompts: &[Prompt]) -> Result<Vec<Prompt>, RemoteError> {
        assert_eq!(config.page_id, "page-1");
        self.seen
            .borrow_mut()
            .extend(prompts.iter().map(|p| p.id.clone()));
        let mut out = prompts.to_vec();
        out.push(sample("remote", "from notion"));
        Ok(out)
    }
}

struct FailingRemote;

impl RemoteSync for FailingRemote {
    fn exchange(&self, _config: &NotionConfig, _prompts: &[Prompt]) -> Result<Vec<Prompt>, RemoteError> {
        Err("notion returned 502".into())
    }
}

fn store_with_local(dir: &std::path::Path) -> PromptStore {
    let mut store = PromptStore::open(&StoreConfig::with_data_dir(dir)).unwrap();
    store
        .save(vec![sample("local", "mine")], StorageType::Sync)
        .unwrap();
    store
}

#[test]
fn successful_sync_saves_remote_list_under_notion() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_with_local(dir.path());
    store.set_notion_config(&notion()).unwrap();
    let remote = AppendingRemote::default();

    sync_with_remote(&mut store, &remote, 1_234).unwrap();

    assert_eq!(*remote.seen.borrow(), vec!["local".to_string()]);
    assert_eq!(store.storage_type(), StorageType::Notion);
    assert_eq!(
        store.sync_status().unwrap(),
        SyncStatus {
            last_synced: Some(1_234),
            in_progress: false,
            error: None,
        }
    );

    let mut fresh = PromptStore::open(&StoreConfig::with_data_dir(dir.path())).unwrap();
    let loaded = fresh.load().unwrap();
    assert_eq!(loaded.storage_type, StorageType::Notion);
    let ids: Vec<&str> = loaded.prompts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["local", "remote"]);
}

#[test]
fn sync_without_credentials_fails_and_records_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_with_local(dir.path());

    let err = sync_with_remote(&mut store, &AppendingRemote::default(), 1).unwrap_err();
    assert!(matches!(err, StoreError::SyncNotConfigured));

    let status = store.sync_status().unwrap();
    assert!(!status.in_progress);
    assert_eq!(status.error.as_deref(), Some("third-party sync is not configured"));
    assert_eq!(store.storage_type(), StorageType::Sync);
}

#[test]
fn remote_failure_keeps_local_data_and_last_sync_time() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_with_local(dir.path());
    store.set_notion_config(&notion()).unwrap();
    sync_with_remote(&mut store, &AppendingRemote::default(), 100).unwrap();
    let before = store.prompts().to_vec();

    let err = sync_with_remote(&mut store, &FailingRemote, 200).unwrap_err();
    assert!(matches!(err, StoreError::Remote(_)));

    let status = store.sync_status().unwrap();
    assert_eq!(status.last_synced, Some(100));
    assert!(!status.in_progress);
    assert!(status.error.unwrap().contains("502"));

    let mut fresh = PromptStore::open(&StoreConfig::with_data_dir(dir.path())).unwrap();
    assert_eq!(fresh.load().unwrap().prompts, before);
}
