use crate::factory::Backend;

/// What a quota violation was measured against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaScope {
    Item(String),
    Total,
}

impl std::fmt::Display for QuotaScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaScope::Item(key) => write!(f, "item `{key}`"),
            QuotaScope::Total => f.write_str("total storage"),
        }
    }
}

/// Failures reported by a [`crate::kv::KvBackend`].
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("{backend} backend quota exceeded for {scope}: {needed} bytes needed, limit is {limit}")]
    QuotaExceeded {
        backend: Backend,
        scope: QuotaScope,
        needed: usize,
        limit: usize,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KvError {
    pub fn is_quota(&self) -> bool {
        matches!(self, KvError::QuotaExceeded { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Kv(#[from] KvError),

    /// The selected backend rejected the collection for size and the bulk
    /// retry failed too, for whatever reason.
    #[error("quota exceeded ({primary}); bulk fallback failed: {fallback}")]
    QuotaExhausted { primary: KvError, fallback: KvError },

    #[error("prompt `{id}` has an empty `{field}`")]
    InvalidPrompt { id: String, field: &'static str },

    #[error("invalid import: {0}")]
    InvalidImport(String),

    #[error("prompt not found: {0}")]
    NotFound(String),

    #[error("third-party sync is not configured")]
    SyncNotConfigured,

    #[error("remote sync failed: {0}")]
    Remote(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
