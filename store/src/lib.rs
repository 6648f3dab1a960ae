//! Prompt storage over quota-limited key/value backends.
//!
//! Prompts too large for a single backend item are stored as a metadata shell
//! plus ordered content fragments and reassembled transparently on load.

pub mod chunk;
pub mod config;
pub mod error;
pub mod events;
pub mod factory;
pub mod kv;
pub mod search;
pub mod size;
pub mod store;
pub mod sync;
pub mod transfer;
pub mod types;

pub use config::StoreConfig;
pub use error::KvError;
pub use error::StoreError;
pub use store::PromptStore;
pub use types::Prompt;
pub use types::StorageType;
