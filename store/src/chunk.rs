//! Splitting oversized prompts into bounded fragments and putting them back
//! together.

use crate::config::StoreConfig;
use crate::size::size_kb;
use crate::types::Prompt;
use crate::types::PromptShell;

/// Content substituted for a chunked prompt whose fragments are missing or
/// incomplete.
pub const FRAGMENT_ERROR_SENTINEL: &str =
    "[Error: this prompt's content could not be restored because some of its chunks are missing]";

pub const DEFAULT_CHUNK_THRESHOLD_KB: f64 = 7.0;
pub const DEFAULT_FRAGMENT_CHARS: usize = 3000;

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkedPrompt {
    pub shell: PromptShell,
    pub fragments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunker {
    threshold_kb: f64,
    fragment_chars: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_THRESHOLD_KB, DEFAULT_FRAGMENT_CHARS)
    }
}

impl Chunker {
    pub fn new(threshold_kb: f64, fragment_chars: usize) -> Self {
        Self {
            threshold_kb,
            fragment_chars: fragment_chars.max(1),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.chunk_threshold_kb, config.fragment_chars)
    }

    pub fn threshold_kb(&self) -> f64 {
        self.threshold_kb
    }

    pub fn needs_chunking(&self, prompt: &Prompt) -> bool {
        size_kb(prompt) > self.threshold_kb
    }

    /// Returns `None` when the prompt fits under the threshold and should be
    /// stored whole.
    pub fn chunk(&self, prompt: &Prompt) -> Option<ChunkedPrompt> {
        let size = size_kb(prompt);
        if size <= self.threshold_kb {
            return None;
        }
        let fragments = split_fragments(&prompt.content, self.fragment_chars);
        let shell = PromptShell {
            id: prompt.id.clone(),
            title: prompt.title.clone(),
            tags: prompt.tags.clone(),
            created_at: prompt.created_at,
            updated_at: prompt.updated_at,
            chunk_count: fragments.len(),
            original_size: size,
        };
        Some(ChunkedPrompt { shell, fragments })
    }
}

/// Split `content` into pieces of at most `max_chars` characters. Always
/// yields at least one fragment, so empty content becomes `[""]`.
pub fn split_fragments(content: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut fragments = Vec::with_capacity(content.len() / max_chars + 1);
    let mut current = String::new();
    let mut count = 0usize;
    for ch in content.chars() {
        current.push(ch);
        count += 1;
        if count == max_chars {
            fragments.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() || fragments.is_empty() {
        fragments.push(current);
    }
    fragments
}

/// A shell whose fragment sequence does not match its declared count.
/// `degraded` is the best-effort prompt carrying [`FRAGMENT_ERROR_SENTINEL`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("prompt `{id}` declares {expected} chunks but {found} were found")]
pub struct FragmentMismatch {
    pub id: String,
    pub expected: usize,
    pub found: usize,
    pub degraded: Prompt,
}

pub fn reconstruct(
    shell: &PromptShell,
    fragments: Option<&[String]>,
) -> Result<Prompt, FragmentMismatch> {
    let found = fragments.map_or(0, <[String]>::len);
    match fragments {
        Some(parts) if parts.len() == shell.chunk_count => Ok(rebuild(shell, parts.concat())),
        _ => Err(FragmentMismatch {
            id: shell.id.clone(),
            expected: shell.chunk_count,
            found,
            degraded: rebuild(shell, FRAGMENT_ERROR_SENTINEL.to_string()),
        }),
    }
}

fn rebuild(shell: &PromptShell, content: String) -> Prompt {
    Prompt {
        id: shell.id.clone(),
        title: shell.title.clone(),
        content,
        tags: shell.tags.clone(),
        created_at: shell.created_at,
        updated_at: shell.updated_at,
    }
}
