//! [`DurableStore`](tether_core::DurableStore) implementations.
//!
//! - [`MemoryStore`]: process-local map, nothing survives a restart
//! - [`FileStore`]: one file per key with atomic replace
//! - [`SqliteStore`]: single key/value table in a SQLite database

pub mod file;
pub mod memory;
pub mod sqlite;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
