#![forbid(unsafe_code)]

pub mod local;
pub mod repository;
pub mod sqlite;

pub use local::{FileStore, KeyValueStore, LocalCache, MemoryStore};
pub use repository::{InMemoryRepository, Storage, StorageError};
