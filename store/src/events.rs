//! Structured diagnostics emitted by [`crate::store::PromptStore`].

use std::sync::Mutex;

use crate::factory::Backend;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A prompt was stored as a shell plus fragments.
    Chunked {
        prompt_id: String,
        fragments: usize,
        size_kb: f64,
    },
    /// The save payload is close to the bulk backend quota.
    SizeWarning {
        payload_bytes: usize,
        limit_bytes: usize,
    },
    /// The selected backend rejected the write for size; retrying on `to`.
    QuotaFallback {
        from: Backend,
        to: Backend,
        reason: String,
    },
    /// Nothing persisted on the compact backend; the load read the bulk one.
    LoadedFromBulk,
    FragmentMismatch {
        prompt_id: String,
        expected: usize,
        found: usize,
    },
    /// An entry of the `prompts` array could not be decoded and was skipped.
    MalformedEntry { index: usize, reason: String },
}

pub trait StoreObserver: Send + Sync {
    fn on_event(&self, event: &StoreEvent);
}

/// Default observer: forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StoreObserver for TracingObserver {
    fn on_event(&self, event: &StoreEvent) {
        match event {
            StoreEvent::Chunked {
                prompt_id,
                fragments,
                size_kb,
            } => tracing::debug!(prompt_id = %prompt_id, fragments, size_kb, "chunked oversized prompt"),
            StoreEvent::SizeWarning {
                payload_bytes,
                limit_bytes,
            } => tracing::warn!(
                payload_bytes,
                limit_bytes,
                "prompt collection is approaching the storage quota"
            ),
            StoreEvent::QuotaFallback { from, to, reason } => tracing::warn!(
                from = %from,
                to = %to,
                reason = %reason,
                "quota exceeded, falling back"
            ),
            StoreEvent::LoadedFromBulk => {
                tracing::debug!("no collection on compact backend, loaded from bulk")
            }
            StoreEvent::FragmentMismatch {
                prompt_id,
                expected,
                found,
            } => tracing::warn!(prompt_id = %prompt_id, expected, found, "prompt chunks missing"),
            StoreEvent::MalformedEntry { index, reason } => {
                tracing::warn!(index, reason = %reason, "skipping malformed stored prompt")
            }
        }
    }
}

/// Keeps every event in memory. Useful for tests and for surfacing
/// diagnostics after an operation.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<StoreEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl StoreObserver for RecordingObserver {
    fn on_event(&self, event: &StoreEvent) {
        TracingObserver.on_event(event);
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
