//! Client-side cache: history, mastery, review queue and resumable sessions.

mod cache;
mod store;

pub use cache::LocalCache;
pub use store::{FileStore, KeyValueStore, MemoryStore};
