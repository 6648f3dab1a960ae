use serde_json::Map;
use serde_json::Value;

use crate::error::KvError;
use crate::factory::Backend;
use crate::size::encoded_len;

pub mod json_file;
pub mod sqlite;

pub use json_file::JsonFileBackend;
pub use sqlite::SqliteBackend;

/// A flat string-keyed namespace of JSON values.
///
/// `set` is all-or-nothing: when it returns an error, none of the entries
/// were written. Size rejections are reported as [`KvError::QuotaExceeded`]
/// so callers can tell them apart from other failures.
pub trait KvBackend: Send + Sync {
    fn backend(&self) -> Backend;

    /// Values for the requested keys. Absent keys are omitted.
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, KvError>;

    fn set(&self, entries: Map<String, Value>) -> Result<(), KvError>;

    fn remove(&self, keys: &[&str]) -> Result<(), KvError>;

    fn bytes_in_use(&self) -> Result<usize, KvError>;
}

/// Bytes one entry occupies against a quota: key plus encoded value.
pub(crate) fn item_size(key: &str, value: &Value) -> Result<usize, KvError> {
    Ok(key.len() + encoded_len(value)?)
}
