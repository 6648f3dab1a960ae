use serde::Deserialize;
use std::path::Path;
use std::path::PathBuf;

use crate::chunk::DEFAULT_CHUNK_THRESHOLD_KB;
use crate::chunk::DEFAULT_FRAGMENT_CHARS;
use crate::error::StoreError;

pub const CONFIG_FILE: &str = "config.toml";

/// Per-item ceiling of the compact backend.
pub const DEFAULT_COMPACT_ITEM_QUOTA_BYTES: usize = 8 * 1024;
pub const DEFAULT_COMPACT_TOTAL_QUOTA_BYTES: usize = 100 * 1024;
pub const DEFAULT_BULK_QUOTA_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_SIZE_WARNING_RATIO: f64 = 0.9;

/// Storage configuration. Loaded from `<home>/config.toml`, then overridden
/// field by field from `PROMPTKEEP_*` environment variables.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding `sync.json` and `local.sqlite`. Relative paths are
    /// resolved against the home directory.
    pub data_dir: PathBuf,
    pub chunk_threshold_kb: f64,
    pub fragment_chars: usize,
    pub compact_item_quota_bytes: usize,
    pub compact_total_quota_bytes: usize,
    pub bulk_quota_bytes: usize,
    /// Fraction of `bulk_quota_bytes` above which a save emits a size warning.
    pub size_warning_ratio: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            chunk_threshold_kb: DEFAULT_CHUNK_THRESHOLD_KB,
            fragment_chars: DEFAULT_FRAGMENT_CHARS,
            compact_item_quota_bytes: DEFAULT_COMPACT_ITEM_QUOTA_BYTES,
            compact_total_quota_bytes: DEFAULT_COMPACT_TOTAL_QUOTA_BYTES,
            bulk_quota_bytes: DEFAULT_BULK_QUOTA_BYTES,
            size_warning_ratio: DEFAULT_SIZE_WARNING_RATIO,
        }
    }
}

impl StoreConfig {
    pub fn with_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Read `<home>/config.toml` (missing file means defaults) and apply
    /// environment overrides.
    pub fn load(home: &Path) -> Result<Self, StoreError> {
        let mut config = match std::fs::read_to_string(home.join(CONFIG_FILE)) {
            Ok(text) => Self::from_toml(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        if config.data_dir.is_relative() {
            config.data_dir = home.join(&config.data_dir);
        }
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, StoreError> {
        toml::from_str(text).map_err(|e| StoreError::Config(format!("{CONFIG_FILE}: {e}")))
    }

    /// Apply overrides from `lookup`, usually the process environment:
    /// - `PROMPTKEEP_DATA_DIR`
    /// - `PROMPTKEEP_CHUNK_THRESHOLD_KB`
    /// - `PROMPTKEEP_FRAGMENT_CHARS`
    /// - `PROMPTKEEP_BULK_QUOTA_BYTES`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("PROMPTKEEP_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup("PROMPTKEEP_CHUNK_THRESHOLD_KB") {
            self.chunk_threshold_kb = parse_override("PROMPTKEEP_CHUNK_THRESHOLD_KB", &v)?;
        }
        if let Some(v) = lookup("PROMPTKEEP_FRAGMENT_CHARS") {
            self.fragment_chars = parse_override("PROMPTKEEP_FRAGMENT_CHARS", &v)?;
        }
        if let Some(v) = lookup("PROMPTKEEP_BULK_QUOTA_BYTES") {
            self.bulk_quota_bytes = parse_override("PROMPTKEEP_BULK_QUOTA_BYTES", &v)?;
        }
        Ok(())
    }
}

fn parse_override<T>(key: &str, value: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| StoreError::Config(format!("{key}={value}: {e}")))
}
