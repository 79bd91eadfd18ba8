//! Persisted model snapshot: atomic file I/O and URL-addressed load/save.

pub mod atomic;
pub mod snapshot;

pub use snapshot::{default_store_url, load, resolve_store_url, save, PERSISTED_PROPERTIES};
