use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::kv::JsonFileBackend;
use crate::kv::KvBackend;
use crate::kv::SqliteBackend;
use crate::types::StorageType;

pub const COMPACT_FILE: &str = "sync.json";
pub const BULK_FILE: &str = "local.sqlite";

/// Physical storage target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Quota-strict, sync-style storage.
    Compact,
    /// Higher-capacity local storage.
    Bulk,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Compact => f.write_str("compact"),
            Backend::Bulk => f.write_str("bulk"),
        }
    }
}

impl StorageType {
    /// The backend a collection bound to this storage type is written to.
    pub fn backend(self) -> Backend {
        match self {
            StorageType::Local => Backend::Bulk,
            StorageType::Sync | StorageType::Notion => Backend::Compact,
        }
    }
}

/// Both physical backends, opened once and selected per operation.
pub struct Backends {
    compact: Box<dyn KvBackend>,
    bulk: Box<dyn KvBackend>,
}

impl Backends {
    pub fn new(compact: Box<dyn KvBackend>, bulk: Box<dyn KvBackend>) -> Self {
        Self { compact, bulk }
    }

    pub fn select(&self, backend: Backend) -> &dyn KvBackend {
        match backend {
            Backend::Compact => self.compact.as_ref(),
            Backend::Bulk => self.bulk.as_ref(),
        }
    }

    pub fn compact(&self) -> &dyn KvBackend {
        self.compact.as_ref()
    }

    pub fn bulk(&self) -> &dyn KvBackend {
        self.bulk.as_ref()
    }
}

/// Open `<data_dir>/sync.json` as the compact backend and
/// `<data_dir>/local.sqlite` as the bulk backend.
pub fn open_backends(config: &StoreConfig) -> Result<Backends, StoreError> {
    std::fs::create_dir_all(&config.data_dir)?;
    let compact = JsonFileBackend::new(
        config.data_dir.join(COMPACT_FILE),
        config.compact_item_quota_bytes,
        config.compact_total_quota_bytes,
    );
    let bulk = SqliteBackend::new(config.data_dir.join(BULK_FILE), config.bulk_quota_bytes);
    Ok(Backends::new(Box::new(compact), Box::new(bulk)))
}
