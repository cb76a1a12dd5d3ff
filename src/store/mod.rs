//! Application state store: key-value backends, document persistence, and the live store resource.
pub mod kv;
pub mod persistence;
pub mod resource;

pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use resource::LedgerStore;
