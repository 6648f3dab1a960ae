use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use super::*;
use crate::error::QuotaScope;

/// Compact backend: one JSON document on disk, with a per-item and a total
/// quota checked before anything is written.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
    item_quota: usize,
    total_quota: usize,
}

impl JsonFileBackend {
    pub fn new<P: AsRef<Path>>(path: P, item_quota: usize, total_quota: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            item_quota,
            total_quota,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, KvError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if data.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn write_all(&self, doc: &Map<String, Value>) -> Result<(), KvError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut tmp, doc)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn quota_error(&self, scope: QuotaScope, needed: usize, limit: usize) -> KvError {
        KvError::QuotaExceeded {
            backend: Backend::Compact,
            scope,
            needed,
            limit,
        }
    }
}

impl KvBackend for JsonFileBackend {
    fn backend(&self) -> Backend {
        Backend::Compact
    }

    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, KvError> {
        let mut doc = self.read_all()?;
        let mut out = Map::new();
        for key in keys {
            if let Some(value) = doc.remove(*key) {
                out.insert((*key).to_string(), value);
            }
        }
        Ok(out)
    }

    fn set(&self, entries: Map<String, Value>) -> Result<(), KvError> {
        let mut doc = self.read_all()?;
        for (key, value) in entries {
            let size = item_size(&key, &value)?;
            if size > self.item_quota {
                return Err(self.quota_error(QuotaScope::Item(key), size, self.item_quota));
            }
            doc.insert(key, value);
        }
        let mut total = 0usize;
        for (key, value) in &doc {
            total += item_size(key, value)?;
        }
        if total > self.total_quota {
            return Err(self.quota_error(QuotaScope::Total, total, self.total_quota));
        }
        self.write_all(&doc)
    }

    fn remove(&self, keys: &[&str]) -> Result<(), KvError> {
        let mut doc = self.read_all()?;
        let before = doc.len();
        for key in keys {
            doc.remove(*key);
        }
        if doc.len() != before {
            self.write_all(&doc)?;
        }
        Ok(())
    }

    fn bytes_in_use(&self) -> Result<usize, KvError> {
        let doc = self.read_all()?;
        let mut total = 0usize;
        for (key, value) in &doc {
            total += item_size(key, value)?;
        }
        Ok(total)
    }
}
