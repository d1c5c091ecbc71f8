//! Attempt-history storage.
//!
//! Implements the `AttemptStore` trait over an in-process map and over an
//! append-only JSON-lines file.

pub mod config;
pub mod file;
pub mod memory;

pub use config::{create_store, StoreConfig};
pub use file::FileStore;
pub use memory::MemoryStore;
