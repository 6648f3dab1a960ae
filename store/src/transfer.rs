//! JSON export and import of the prompt collection.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde_json::Value;

use crate::error::StoreError;
use crate::store::PromptStore;
use crate::store::SaveReport;
use crate::types::Prompt;

/// Pretty-printed JSON array of `prompts`.
pub fn export_json(prompts: &[Prompt]) -> Result<String, StoreError> {
    Ok(serde_json::to_string_pretty(prompts)?)
}

/// `prompts-export-2024-05-01T09-30-00-000Z.json` for the given instant.
pub fn export_file_name(now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("prompts-export-{stamp}.json")
}

/// Write the store's current collection into `dir` and return the file path.
pub fn export_to_dir(
    store: &PromptStore,
    dir: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf, StoreError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(now));
    std::fs::write(&path, export_json(store.prompts())?)?;
    Ok(path)
}

/// Parse and validate an import payload without touching any store.
pub fn parse_import(text: &str) -> Result<Vec<Prompt>, StoreError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| StoreError::InvalidImport(format!("not valid JSON: {e}")))?;
    let Value::Array(items) = value else {
        return Err(StoreError::InvalidImport(
            "expected a JSON array of prompts".to_string(),
        ));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let prompt: Prompt = serde_json::from_value(item)
                .map_err(|e| StoreError::InvalidImport(format!("entry {index}: {e}")))?;
            match prompt.missing_field() {
                Some(field) => Err(StoreError::InvalidImport(format!(
                    "entry {index} is missing a non-empty `{field}`"
                ))),
                None => Ok(prompt),
            }
        })
        .collect()
}

/// Overwrite or append each incoming prompt by id. Existing prompts keep their
/// position; later duplicates in `incoming` win over earlier ones.
pub fn merge_by_id(existing: Vec<Prompt>, incoming: Vec<Prompt>) -> Vec<Prompt> {
    let mut merged = existing;
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id.clone(), i))
        .collect();
    for prompt in incoming {
        match index.get(&prompt.id) {
            Some(&i) => merged[i] = prompt,
            None => {
                index.insert(prompt.id.clone(), merged.len());
                merged.push(prompt);
            }
        }
    }
    merged
}

#[derive(Debug, Clone, PartialEq)]
pub struct Imported {
    /// Number of entries in the import payload.
    pub count: usize,
    /// The merged collection as saved.
    pub prompts: Vec<Prompt>,
    pub report: SaveReport,
}

/// Validate `text`, merge it into the persisted collection and save under the
/// current storage type. Invalid payloads are rejected before the store is
/// read or written.
pub fn import_json(store: &mut PromptStore, text: &str) -> Result<Imported, StoreError> {
    let incoming = parse_import(text)?;
    let count = incoming.len();
    let loaded = store.load()?;
    let merged = merge_by_id(loaded.prompts, incoming);
    let report = store.save(merged.clone(), loaded.storage_type)?;
    tracing::info!(count, total = merged.len(), "imported prompts");
    Ok(Imported {
        count,
        prompts: merged,
        report,
    })
}
