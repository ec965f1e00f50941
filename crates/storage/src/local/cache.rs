use std::sync::Arc;

use edu_core::model::{ActiveSession, Attempt, MasteryMap, ReviewQueue, SlotKey, UserId};
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::store::KeyValueStore;
use crate::repository::StorageError;

const BEST: &str = "best";
const HISTORY: &str = "history";
const MASTERY: &str = "mastery";
const REVIEW_QUEUE: &str = "review_queue";
const SESSION: &str = "session";

/// Typed view over a [`KeyValueStore`], namespaced per user.
///
/// Reads never fail: a missing, unreadable or corrupt value is reported as
/// empty so callers fall back to a fresh fetch.
#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl LocalCache {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Cache scoped to one user, under the `edu:{user}` namespace.
    #[must_use]
    pub fn for_user(store: Arc<dyn KeyValueStore>, user: UserId) -> Self {
        Self::new(store, format!("edu:{user}"))
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{suffix}", self.namespace)
    }

    fn session_key(&self, slot: &SlotKey) -> String {
        self.key(&format!("{SESSION}:{}", slot.cache_fragment()))
    }

    fn best_key(&self, slot: &SlotKey) -> String {
        self.key(&format!("{BEST}:{}", slot.full_cache_fragment()))
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("local cache read failed for {key}: {err}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("discarding corrupt cache entry {key}: {err}");
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw =
            serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.store.set(key, &raw)
    }

    //
    // ─── HISTORY ───────────────────────────────────────────────────────────────
    //

    /// Last-known best attempts, or `None` when nothing usable is cached.
    ///
    /// Only a list fetched whole from remote storage is cached here, so a hit
    /// is never a partial history.
    #[must_use]
    pub fn history(&self) -> Option<Vec<Attempt>> {
        self.read(&self.key(HISTORY))
    }

    /// Cached best of one slot, from its own entry or else the cached history.
    #[must_use]
    pub fn best_attempt(&self, slot: &SlotKey) -> Option<Attempt> {
        let found = self
            .read::<Attempt>(&self.best_key(slot))
            .filter(|a| a.slot_key() == *slot)
            .or_else(|| {
                self.history()?
                    .into_iter()
                    .find(|a| a.slot_key() == *slot)
            });
        debug!("local best for {slot}: {}", found.is_some());
        found
    }

    /// Store `attempt` as the cached best of its slot, replacing any previous one.
    ///
    /// A cached history is updated in place; without one the history stays
    /// uncached so the next read fetches the full list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entries cannot be written.
    pub fn upsert_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        let slot = attempt.slot_key();
        self.write(&self.best_key(&slot), attempt)?;

        let Some(mut history) = self.history() else {
            return Ok(());
        };
        match history.iter_mut().find(|a| a.slot_key() == slot) {
            Some(existing) => *existing = attempt.clone(),
            None => history.push(attempt.clone()),
        }
        self.write(&self.key(HISTORY), &history)
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the history cannot be written.
    pub fn replace_history(&self, attempts: &[Attempt]) -> Result<(), StorageError> {
        self.write(&self.key(HISTORY), &attempts)
    }

    //
    // ─── MASTERY ───────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn mastery(&self) -> Option<MasteryMap> {
        self.read(&self.key(MASTERY))
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the map cannot be written.
    pub fn store_mastery(&self, mastery: &MasteryMap) -> Result<(), StorageError> {
        self.write(&self.key(MASTERY), mastery)
    }

    /// Drop the cached mastery so the next read recomputes it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be removed.
    pub fn clear_mastery(&self) -> Result<(), StorageError> {
        self.store.remove(&self.key(MASTERY))
    }

    //
    // ─── REVIEW QUEUE ──────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn review_queue(&self) -> ReviewQueue {
        self.read(&self.key(REVIEW_QUEUE)).unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the queue cannot be written.
    pub fn store_review_queue(&self, queue: &ReviewQueue) -> Result<(), StorageError> {
        self.write(&self.key(REVIEW_QUEUE), queue)
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be removed.
    pub fn clear_review_queue(&self) -> Result<(), StorageError> {
        self.store.remove(&self.key(REVIEW_QUEUE))
    }

    //
    // ─── ACTIVE SESSIONS ───────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn load_session(&self, slot: &SlotKey) -> Option<ActiveSession> {
        self.read(&self.session_key(slot))
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be written.
    pub fn save_session(&self, session: &ActiveSession) -> Result<(), StorageError> {
        self.write(&self.session_key(&session.slot_key()), session)
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be removed.
    pub fn clear_session(&self, slot: &SlotKey) -> Result<(), StorageError> {
        self.store.remove(&self.session_key(slot))
    }
}
