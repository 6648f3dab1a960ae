//! The record store: owns the persisted collection and is the only component
//! that touches the backends.
//!
//! A collection is written as one `set` call carrying four keys: the
//! `prompts` list (whole records and chunk shells), the `storageType` flag,
//! the derived `tags` index and the `promptChunks` fragment map. The fragment
//! map is rebuilt from scratch on every save, so a prompt that disappears from
//! the list loses its fragments in the same write.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;

use crate::chunk::ChunkedPrompt;
use crate::chunk::Chunker;
use crate::chunk::reconstruct;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::events::StoreEvent;
use crate::events::StoreObserver;
use crate::events::TracingObserver;
use crate::factory::Backend;
use crate::factory::Backends;
use crate::factory::open_backends;
use crate::size::encoded_len;
use crate::size::to_kb;
use crate::types::NotionConfig;
use crate::transfer::merge_by_id;
use crate::types::Prompt;
use crate::types::PromptShell;
use crate::types::StorageType;
use crate::types::StoredPrompt;
use crate::types::SyncStatus;
use crate::types::default_tags;

pub const PROMPTS_KEY: &str = "prompts";
pub const STORAGE_TYPE_KEY: &str = "storageType";
pub const TAGS_KEY: &str = "tags";
pub const CHUNKS_KEY: &str = "promptChunks";
pub const NOTION_CONFIG_KEY: &str = "notionConfig";
pub const SYNC_STATUS_KEY: &str = "syncStatus";

const COLLECTION_KEYS: [&str; 4] = [PROMPTS_KEY, STORAGE_TYPE_KEY, TAGS_KEY, CHUNKS_KEY];

pub type FragmentMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    /// Backend that actually holds the collection now.
    pub backend: Backend,
    /// True when the selected backend rejected the write for size and the
    /// bulk backend took it instead.
    pub fallback: bool,
    /// Ids of prompts stored as shell plus fragments.
    pub chunked: Vec<String>,
    pub payload_bytes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub prompts: Vec<Prompt>,
    pub storage_type: StorageType,
    /// Backend the collection was read from.
    pub source: Backend,
    /// Ids of chunked prompts whose content was replaced by the error
    /// sentinel.
    pub degraded: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct Collection {
    prompts: Vec<Prompt>,
    storage_type: StorageType,
    tags: Vec<String>,
    fragments: FragmentMap,
    /// Shells that failed to reassemble, keyed by id.
    held: BTreeMap<String, HeldShell>,
}

/// A chunked prompt that loaded degraded. Until the caller replaces the
/// placeholder, saves write the original shell and whatever fragments
/// survived instead of the sentinel content.
#[derive(Debug, Clone)]
struct HeldShell {
    shell: PromptShell,
    fragments: Option<Vec<String>>,
    placeholder: Prompt,
}

pub struct PromptStore {
    backends: Backends,
    chunker: Chunker,
    bulk_quota_bytes: usize,
    size_warning_ratio: f64,
    observer: Arc<dyn StoreObserver>,
    state: Collection,
}

impl PromptStore {
    /// Open the backends described by `config`. The in-memory collection is
    /// empty until [`PromptStore::load`] is called.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let backends = open_backends(config)?;
        Ok(Self::with_backends(config, backends))
    }

    pub fn with_backends(config: &StoreConfig, backends: Backends) -> Self {
        Self {
            backends,
            chunker: Chunker::from_config(config),
            bulk_quota_bytes: config.bulk_quota_bytes,
            size_warning_ratio: config.size_warning_ratio,
            observer: Arc::new(TracingObserver),
            state: Collection {
                tags: default_tags(),
                ..Collection::default()
            },
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn StoreObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    pub fn prompts(&self) -> &[Prompt] {
        &self.state.prompts
    }

    pub fn get(&self, id: &str) -> Option<&Prompt> {
        self.state.prompts.iter().find(|p| p.id == id)
    }

    pub fn tags(&self) -> &[String] {
        &self.state.tags
    }

    pub fn storage_type(&self) -> StorageType {
        self.state.storage_type
    }

    pub fn fragments(&self) -> &FragmentMap {
        &self.state.fragments
    }

    fn emit(&self, event: StoreEvent) {
        self.observer.on_event(&event);
    }

    /// Persist `records` as the whole collection under `storage_type`.
    ///
    /// Duplicate ids collapse to the last record with that id. Every record
    /// needs a non-empty `id`, `title` and `content`. A quota rejection from
    /// the compact backend is retried once on the bulk backend. On error the
    /// persisted collection and the in-memory state are left as they were.
    pub fn save(
        &mut self,
        records: Vec<Prompt>,
        storage_type: StorageType,
    ) -> Result<SaveReport, StoreError> {
        let records = dedupe_by_id(records);
        if let Some((id, field)) = records
            .iter()
            .find_map(|p| p.missing_field().map(|field| (p.id.clone(), field)))
        {
            return Err(StoreError::InvalidPrompt { id, field });
        }
        let tags = tag_index(&records);
        let mut entries = Vec::with_capacity(records.len());
        let mut fragments = FragmentMap::new();
        let mut chunked = Vec::new();
        let mut held = BTreeMap::new();
        for prompt in &records {
            if let Some(kept) = self.state.held.get(&prompt.id)
                && kept.placeholder == *prompt
            {
                if let Some(parts) = &kept.fragments {
                    fragments.insert(prompt.id.clone(), parts.clone());
                }
                entries.push(StoredPrompt::Chunked(kept.shell.clone()));
                held.insert(prompt.id.clone(), kept.clone());
                continue;
            }
            match self.chunker.chunk(prompt) {
                Some(ChunkedPrompt {
                    shell,
                    fragments: parts,
                }) => {
                    self.emit(StoreEvent::Chunked {
                        prompt_id: shell.id.clone(),
                        fragments: parts.len(),
                        size_kb: shell.original_size,
                    });
                    chunked.push(shell.id.clone());
                    fragments.insert(shell.id.clone(), parts);
                    entries.push(StoredPrompt::Chunked(shell));
                }
                None => entries.push(StoredPrompt::Whole(prompt.clone())),
            }
        }

        let mut payload = Map::new();
        payload.insert(PROMPTS_KEY.to_string(), serde_json::to_value(&entries)?);
        payload.insert(
            STORAGE_TYPE_KEY.to_string(),
            serde_json::to_value(storage_type)?,
        );
        payload.insert(TAGS_KEY.to_string(), serde_json::to_value(&tags)?);
        payload.insert(CHUNKS_KEY.to_string(), serde_json::to_value(&fragments)?);
        let payload_bytes = encoded_len(&payload)?;
        self.check_payload_size(payload_bytes);

        let target = storage_type.backend();
        let (backend, fallback) = match self.backends.select(target).set(payload.clone()) {
            Ok(()) => (target, false),
            Err(primary) if primary.is_quota() && target != Backend::Bulk => {
                self.emit(StoreEvent::QuotaFallback {
                    from: target,
                    to: Backend::Bulk,
                    reason: primary.to_string(),
                });
                match self.backends.bulk().set(payload) {
                    Ok(()) => (Backend::Bulk, true),
                    Err(fallback) => {
                        return Err(StoreError::QuotaExhausted { primary, fallback });
                    }
                }
            }
            Err(err) => return Err(err.into()),
        };
        if backend == Backend::Bulk {
            self.retire_compact_copy();
        }

        tracing::debug!(
            backend = %backend,
            fallback,
            prompts = records.len(),
            chunked = chunked.len(),
            bytes = payload_bytes,
            "saved prompt collection"
        );
        self.state = Collection {
            prompts: records,
            storage_type,
            tags,
            fragments,
            held,
        };
        Ok(SaveReport {
            backend,
            fallback,
            chunked,
            payload_bytes,
        })
    }

    fn check_payload_size(&self, payload_bytes: usize) {
        let limit = (self.bulk_quota_bytes as f64 * self.size_warning_ratio) as usize;
        if payload_bytes > limit {
            self.emit(StoreEvent::SizeWarning {
                payload_bytes,
                limit_bytes: self.bulk_quota_bytes,
            });
        }
    }

    /// Drop the collection keys from the compact backend once the bulk backend
    /// holds the current copy, so `load` does not pick up a stale one.
    fn retire_compact_copy(&self) {
        if let Err(err) = self.backends.compact().remove(&COLLECTION_KEYS) {
            tracing::warn!(error = %err, "failed to clear compact copy of the prompt collection");
        }
    }

    /// Read the collection, reassembling chunked prompts.
    ///
    /// Missing or corrupt fragments degrade the affected prompts only; the
    /// call fails just for backend errors.
    pub fn load(&mut self) -> Result<Loaded, StoreError> {
        let mut source = Backend::Compact;
        let mut data = self.backends.compact().get(&COLLECTION_KEYS)?;
        if !holds_collection(&data) {
            let bulk = self.backends.bulk().get(&COLLECTION_KEYS)?;
            if holds_collection(&bulk) {
                self.emit(StoreEvent::LoadedFromBulk);
                data = bulk;
                source = Backend::Bulk;
            }
        }

        let fragments: FragmentMap = decode_or_default(data.remove(CHUNKS_KEY), CHUNKS_KEY);
        let storage_type = data
            .remove(STORAGE_TYPE_KEY)
            .and_then(|v| decode_or_warn::<StorageType>(v, STORAGE_TYPE_KEY))
            .unwrap_or(match source {
                Backend::Bulk => StorageType::Local,
                Backend::Compact => StorageType::default(),
            });
        let tags = data
            .remove(TAGS_KEY)
            .and_then(|v| decode_or_warn::<Vec<String>>(v, TAGS_KEY))
            .unwrap_or_else(default_tags);

        let entries = match data.remove(PROMPTS_KEY) {
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.emit(StoreEvent::MalformedEntry {
                    index: 0,
                    reason: format!("`{PROMPTS_KEY}` is not an array: {other}"),
                });
                Vec::new()
            }
            None => Vec::new(),
        };

        let mut prompts = Vec::with_capacity(entries.len());
        let mut degraded = Vec::new();
        let mut held = BTreeMap::new();
        for (index, value) in entries.into_iter().enumerate() {
            match StoredPrompt::from_value(value) {
                Ok(StoredPrompt::Whole(prompt)) => prompts.push(prompt),
                Ok(StoredPrompt::Chunked(shell)) => {
                    let parts = fragments.get(&shell.id);
                    match reconstruct(&shell, parts.map(Vec::as_slice)) {
                        Ok(prompt) => prompts.push(prompt),
                        Err(mismatch) => {
                            self.emit(StoreEvent::FragmentMismatch {
                                prompt_id: mismatch.id.clone(),
                                expected: mismatch.expected,
                                found: mismatch.found,
                            });
                            degraded.push(mismatch.id.clone());
                            held.insert(
                                mismatch.id,
                                HeldShell {
                                    shell,
                                    fragments: parts.cloned(),
                                    placeholder: mismatch.degraded.clone(),
                                },
                            );
                            prompts.push(mismatch.degraded);
                        }
                    }
                }
                Err(err) => self.emit(StoreEvent::MalformedEntry {
                    index,
                    reason: err.to_string(),
                }),
            }
        }

        self.state = Collection {
            prompts: prompts.clone(),
            storage_type,
            tags,
            fragments,
            held,
        };
        Ok(Loaded {
            prompts,
            storage_type,
            source,
            degraded,
        })
    }

    /// Insert `prompt`, or replace the prompt with the same id, and save under
    /// the current storage type.
    pub fn upsert(&mut self, prompt: Prompt) -> Result<SaveReport, StoreError> {
        let mut records = self.state.prompts.clone();
        match records.iter_mut().find(|p| p.id == prompt.id) {
            Some(slot) => *slot = prompt,
            None => records.push(prompt),
        }
        self.save(records, self.state.storage_type)
    }

    pub fn delete(&mut self, id: &str) -> Result<SaveReport, StoreError> {
        let before = self.state.prompts.len();
        let records: Vec<Prompt> = self
            .state
            .prompts
            .iter()
            .filter(|p| p.id != id)
            .cloned()
            .collect();
        if records.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.save(records, self.state.storage_type)
    }

    /// Re-save the current collection under another storage type.
    pub fn migrate(&mut self, storage_type: StorageType) -> Result<SaveReport, StoreError> {
        self.save(self.state.prompts.clone(), storage_type)
    }

    pub fn stats(&self) -> Result<Value, StoreError> {
        let chunked = self
            .state
            .prompts
            .iter()
            .filter(|p| self.chunker.needs_chunking(p))
            .count();
        let collection_bytes = encoded_len(&self.state.prompts)?;
        Ok(serde_json::json!({
            "total": self.state.prompts.len(),
            "chunked": chunked,
            "tags": self.state.tags.len(),
            "storage_type": self.state.storage_type,
            "collection_kb": to_kb(collection_bytes),
            "bytes_in_use": {
                "compact": self.backends.compact().bytes_in_use()?,
                "bulk": self.backends.bulk().bytes_in_use()?,
            },
        }))
    }

    pub fn notion_config(&self) -> Result<Option<NotionConfig>, StoreError> {
        self.read_setting(NOTION_CONFIG_KEY)
    }

    pub fn set_notion_config(&self, config: &NotionConfig) -> Result<(), StoreError> {
        self.write_setting(NOTION_CONFIG_KEY, config)
    }

    pub fn sync_status(&self) -> Result<SyncStatus, StoreError> {
        Ok(self.read_setting(SYNC_STATUS_KEY)?.unwrap_or_default())
    }

    pub fn set_sync_status(&self, status: &SyncStatus) -> Result<(), StoreError> {
        self.write_setting(SYNC_STATUS_KEY, status)
    }

    // Settings always live on the compact backend.
    fn read_setting<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let mut values = self.backends.compact().get(&[key])?;
        Ok(values
            .remove(key)
            .map(serde_json::from_value)
            .transpose()?)
    }

    fn write_setting<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let mut entry = Map::new();
        entry.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self.backends.compact().set(entry)?)
    }
}

/// Sorted union of every prompt's tags.
pub fn tag_index(prompts: &[Prompt]) -> Vec<String> {
    prompts
        .iter()
        .flat_map(|p| p.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn dedupe_by_id(records: Vec<Prompt>) -> Vec<Prompt> {
    let before = records.len();
    let deduped = merge_by_id(Vec::new(), records);
    if deduped.len() != before {
        tracing::warn!(
            dropped = before - deduped.len(),
            "duplicate prompt ids in save, keeping the last of each"
        );
    }
    deduped
}

fn holds_collection(data: &Map<String, Value>) -> bool {
    let has_prompts = matches!(data.get(PROMPTS_KEY), Some(Value::Array(items)) if !items.is_empty());
    has_prompts || data.get(STORAGE_TYPE_KEY).is_some_and(|v| !v.is_null())
}

fn decode_or_warn<T: DeserializeOwned>(value: Value, key: &str) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::warn!(key, error = %err, "ignoring undecodable stored value");
            None
        }
    }
}

fn decode_or_default<T: DeserializeOwned + Default>(value: Option<Value>, key: &str) -> T {
    value
        .and_then(|v| decode_or_warn(v, key))
        .unwrap_or_default()
}
