use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;

/// Seed vocabulary used when no tag index has been persisted yet.
pub const DEFAULT_TAGS: &[&str] = &[
    "Coding & Development",
    "Writing & Content",
    "Research & Analysis",
    "Business & Marketing",
    "Education & Learning",
    "Creative & Design",
    "Productivity",
    "Personal",
];

pub fn default_tags() -> Vec<String> {
    DEFAULT_TAGS.iter().map(|t| (*t).to_string()).collect()
}

/// A stored prompt as callers see it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: i64, // epoch millis
    #[serde(default)]
    pub updated_at: i64, // epoch millis
}

impl Prompt {
    /// First of `id`, `title`, `content` that is empty. Such a prompt cannot
    /// be stored or imported.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("id", &self.id),
            ("title", &self.title),
            ("content", &self.content),
        ]
        .into_iter()
        .find(|(_, value)| value.is_empty())
        .map(|(field, _)| field)
    }

    pub fn has_any_tag<T: AsRef<str>>(&self, wanted: &[T]) -> bool {
        wanted
            .iter()
            .any(|w| self.tags.iter().any(|t| t == w.as_ref()))
    }
}

/// Stand-in for an oversized prompt in the `prompts` list. The content lives
/// in `chunk_count` fragments stored under the same id.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptShell {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    pub chunk_count: usize,
    /// Estimated size of the whole prompt in KB at the time it was chunked.
    pub original_size: f64,
}

/// One entry of the persisted `prompts` array.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "RawEntry")]
pub enum StoredPrompt {
    Whole(Prompt),
    Chunked(PromptShell),
}

impl StoredPrompt {
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn id(&self) -> &str {
        match self {
            StoredPrompt::Whole(p) => &p.id,
            StoredPrompt::Chunked(s) => &s.id,
        }
    }
}

impl Serialize for StoredPrompt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StoredPrompt::Whole(prompt) => prompt.serialize(serializer),
            StoredPrompt::Chunked(shell) => shell.serialize(serializer),
        }
    }
}

/// Wire shape shared by whole records and shells; resolved into
/// [`StoredPrompt`] once at decode time.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    id: String,
    title: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    created_at: i64,
    #[serde(default)]
    updated_at: i64,
    #[serde(default)]
    chunk_count: Option<usize>,
    #[serde(default)]
    original_size: Option<f64>,
}

impl From<RawEntry> for StoredPrompt {
    fn from(raw: RawEntry) -> Self {
        match raw.chunk_count {
            Some(chunk_count) if chunk_count > 0 => StoredPrompt::Chunked(PromptShell {
                id: raw.id,
                title: raw.title,
                tags: raw.tags,
                created_at: raw.created_at,
                updated_at: raw.updated_at,
                chunk_count,
                original_size: raw.original_size.unwrap_or_default(),
            }),
            _ => StoredPrompt::Whole(Prompt {
                id: raw.id,
                title: raw.title,
                content: raw.content.unwrap_or_default(),
                tags: raw.tags,
                created_at: raw.created_at,
                updated_at: raw.updated_at,
            }),
        }
    }
}

/// Which storage target the collection is bound to.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Local,
    #[default]
    Sync,
    Notion,
}

impl StorageType {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageType::Local => "local",
            StorageType::Sync => "sync",
            StorageType::Notion => "notion",
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StorageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(StorageType::Local),
            "sync" => Ok(StorageType::Sync),
            "notion" => Ok(StorageType::Notion),
            other => Err(format!("unknown storage type: {other}")),
        }
    }
}

/// Credential for the third-party sync target.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotionConfig {
    pub api_key: String,
    pub page_id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub last_synced: Option<i64>,
    #[serde(default)]
    pub in_progress: bool,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn entry_without_chunk_count_decodes_whole() {
        let entry = StoredPrompt::from_value(json!({
            "id": "a",
            "title": "Greeting",
            "content": "hello",
            "tags": ["Personal"],
            "createdAt": 1,
            "updatedAt": 2,
        }))
        .unwrap();
        assert_eq!(
            entry,
            StoredPrompt::Whole(Prompt {
                id: "a".into(),
                title: "Greeting".into(),
                content: "hello".into(),
                tags: vec!["Personal".into()],
                created_at: 1,
                updated_at: 2,
            })
        );
    }

    #[test]
    fn entry_with_chunk_count_decodes_shell() {
        let entry = StoredPrompt::from_value(json!({
            "id": "big",
            "title": "Essay",
            "chunkCount": 3,
            "originalSize": 8.5,
        }))
        .unwrap();
        let StoredPrompt::Chunked(shell) = entry else {
            panic!("expected a shell");
        };
        assert_eq!(shell.chunk_count, 3);
        assert_eq!(shell.original_size, 8.5);
        assert!(shell.tags.is_empty());
    }

    #[test]
    fn zero_chunk_count_is_a_whole_record() {
        let entry = StoredPrompt::from_value(json!({
            "id": "z",
            "title": "t",
            "content": "c",
            "chunkCount": 0,
        }))
        .unwrap();
        assert!(matches!(entry, StoredPrompt::Whole(_)));
    }

    #[test]
    fn shell_serializes_without_content() {
        let shell = StoredPrompt::Chunked(PromptShell {
            id: "big".into(),
            title: "Essay".into(),
            tags: vec![],
            created_at: 0,
            updated_at: 0,
            chunk_count: 2,
            original_size: 9.0,
        });
        let v = serde_json::to_value(&shell).unwrap();
        assert!(v.get("content").is_none());
        assert_eq!(v["chunkCount"], 2);
    }

    #[test]
    fn storage_type_wire_names() {
        assert_eq!(serde_json::to_value(StorageType::Local).unwrap(), json!("local"));
        assert_eq!("notion".parse::<StorageType>().unwrap(), StorageType::Notion);
        assert!("drive".parse::<StorageType>().is_err());
    }

    #[test]
    fn missing_field_reports_first_empty_required_field() {
        let mut p = Prompt {
            id: "a".into(),
            title: "t".into(),
            content: "c".into(),
            tags: vec![],
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(p.missing_field(), None);
        p.content.clear();
        assert_eq!(p.missing_field(), Some("content"));
        p.title.clear();
        assert_eq!(p.missing_field(), Some("title"));
    }
}
