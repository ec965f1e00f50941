use std::sync::Arc;

use log::{debug, info, warn};

use edu_core::model::{AnswerRecord, Attempt, AttemptId, RemoteAttemptId, SlotKey, UserId};
use storage::local::{KeyValueStore, LocalCache};
use storage::repository::{AttemptRepository, StorageError};

use crate::error::AttemptServiceError;

/// Which record blocked a save that did not improve on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentBest {
    Local(AttemptId),
    Remote(RemoteAttemptId),
}

/// Result of reconciling a finished attempt against the stored best.
#[derive(Debug)]
pub enum SaveOutcome {
    /// The attempt did not beat the best already stored; nothing was written.
    NotImproved { current_best: CurrentBest },
    /// Remote storage now holds the attempt as the best of its slot.
    Saved {
        remote_id: RemoteAttemptId,
        replaced: bool,
    },
    /// Remote storage was unreachable; only the local cache was updated.
    LocalOnly { error: StorageError },
}

impl SaveOutcome {
    /// True when the attempt became the cached best, remotely or not.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        !matches!(self, SaveOutcome::NotImproved { .. })
    }
}

/// Keeps one best attempt per slot, across the local cache and remote storage.
#[derive(Clone)]
pub struct AttemptService {
    attempts: Arc<dyn AttemptRepository>,
    store: Arc<dyn KeyValueStore>,
}

impl AttemptService {
    #[must_use]
    pub fn new(attempts: Arc<dyn AttemptRepository>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { attempts, store }
    }

    fn cache(&self, user: UserId) -> LocalCache {
        LocalCache::for_user(Arc::clone(&self.store), user)
    }

    /// Save `attempt` if it beats the stored best for its slot.
    ///
    /// The local cache is consulted first, then remote storage. An attempt is
    /// an improvement only with a strictly higher percentage and at least as
    /// many questions. Remote failures degrade to a local-only save.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::Storage` only when the local cache cannot
    /// be written.
    pub async fn save_attempt(
        &self,
        user: UserId,
        attempt: &Attempt,
        answers: &[AnswerRecord],
    ) -> Result<SaveOutcome, AttemptServiceError> {
        let cache = self.cache(user);
        let slot = attempt.slot_key();

        if let Some(local) = cache.best_attempt(&slot).filter(|l| !attempt.improves_on(l)) {
            debug!(
                "attempt for {slot} ({}%) does not beat local best ({}%)",
                attempt.percentage(),
                local.percentage()
            );
            return Ok(SaveOutcome::NotImproved {
                current_best: CurrentBest::Local(local.id()),
            });
        }

        let remote = match self.attempts.find_best(user, &slot).await {
            Ok(remote) => remote,
            Err(error) => return Self::save_local_only(&cache, attempt, error),
        };

        if let Some(stored) = remote
            .as_ref()
            .filter(|s| !attempt.improves_on(&s.attempt))
        {
            debug!(
                "attempt for {slot} ({}%) does not beat remote best ({}%)",
                attempt.percentage(),
                stored.attempt.percentage()
            );
            return Ok(SaveOutcome::NotImproved {
                current_best: CurrentBest::Remote(stored.remote_id),
            });
        }

        let written = match &remote {
            Some(stored) => self
                .attempts
                .replace_best(user, stored.remote_id, attempt, answers)
                .await
                .map(|()| (stored.remote_id, true)),
            None => self
                .attempts
                .insert_best(user, attempt, answers)
                .await
                .map(|id| (id, false)),
        };
        let (remote_id, replaced) = match written {
            Ok(written) => written,
            Err(error) => return Self::save_local_only(&cache, attempt, error),
        };

        cache.upsert_attempt(attempt)?;
        cache.clear_mastery()?;
        info!(
            "saved best attempt {remote_id} for {slot} at {}%",
            attempt.percentage()
        );

        Ok(SaveOutcome::Saved {
            remote_id,
            replaced,
        })
    }

    fn save_local_only(
        cache: &LocalCache,
        attempt: &Attempt,
        error: StorageError,
    ) -> Result<SaveOutcome, AttemptServiceError> {
        warn!("remote attempt storage failed, keeping attempt locally: {error}");
        cache.upsert_attempt(attempt)?;
        cache.clear_mastery()?;
        Ok(SaveOutcome::LocalOnly { error })
    }

    /// Best attempt for a slot, from the cache when present.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::Storage` if the remote lookup fails.
    pub async fn best_attempt(
        &self,
        user: UserId,
        slot: &SlotKey,
    ) -> Result<Option<Attempt>, AttemptServiceError> {
        if let Some(local) = self.cache(user).best_attempt(slot) {
            return Ok(Some(local));
        }
        let remote = self.attempts.find_best(user, slot).await?;
        Ok(remote.map(|stored| stored.attempt))
    }

    /// Best attempts across all slots, newest first when fetched remotely.
    ///
    /// # Errors
    ///
    /// Returns `AttemptServiceError::Storage` if nothing is cached and the
    /// remote listing fails.
    pub async fn history(&self, user: UserId) -> Result<Vec<Attempt>, AttemptServiceError> {
        let cache = self.cache(user);
        if let Some(history) = cache.history() {
            debug!("history cache hit for user {user}");
            return Ok(history);
        }

        let attempts: Vec<Attempt> = self
            .attempts
            .list_attempts(user)
            .await?
            .into_iter()
            .map(|stored| stored.attempt)
            .collect();
        cache.replace_history(&attempts)?;
        Ok(attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use edu_core::model::{QuestionId, QuizType};
    use edu_core::time::fixed_now;
    use storage::InMemoryRepository;
    use storage::local::MemoryStore;

    fn service() -> (AttemptService, InMemoryRepository, Arc<MemoryStore>) {
        let repo = InMemoryRepository::new();
        let store = Arc::new(MemoryStore::new());
        let svc = AttemptService::new(Arc::new(repo.clone()), store.clone());
        (svc, repo, store)
    }

    fn attempt(slot: &SlotKey, total: u32, correct: u32) -> Attempt {
        Attempt::new(
            AttemptId::generate(),
            slot.clone(),
            fixed_now(),
            total,
            correct,
            total - correct,
        )
        .unwrap()
    }

    fn answers(n: u64) -> Vec<AnswerRecord> {
        (1..=n)
            .map(|id| AnswerRecord {
                question_id: QuestionId::new(id),
                area: Some("Lógica".into()),
                selected_option: Some(0),
                is_correct: true,
            })
            .collect()
    }

    #[tokio::test]
    async fn first_attempt_is_inserted() {
        let (svc, repo, _) = service();
        let user = UserId::new(1);
        let slot = SlotKey::new(QuizType::Area, Some("Lógica"), None);

        let outcome = svc
            .save_attempt(user, &attempt(&slot, 20, 12), &answers(2))
            .await
            .unwrap();
        let SaveOutcome::Saved {
            remote_id,
            replaced,
        } = outcome
        else {
            panic!("expected saved, got {outcome:?}");
        };
        assert!(!replaced);
        assert_eq!(repo.answer_count(remote_id), 2);
    }

    #[tokio::test]
    async fn local_best_blocks_before_remote_is_asked() {
        let (svc, repo, _) = service();
        let user = UserId::new(1);
        let slot = SlotKey::general(QuizType::General);
        let first = attempt(&slot, 20, 15);
        svc.save_attempt(user, &first, &[]).await.unwrap();

        repo.set_offline(true);
        let outcome = svc
            .save_attempt(user, &attempt(&slot, 20, 15), &[])
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SaveOutcome::NotImproved {
                current_best: CurrentBest::Local(id)
            } if id == first.id()
        ));
    }

    #[tokio::test]
    async fn remote_best_blocks_when_cache_is_empty() {
        let (svc, repo, _) = service();
        let user = UserId::new(1);
        let slot = SlotKey::general(QuizType::General);
        let remote_id = repo
            .insert_best(user, &attempt(&slot, 10, 9), &[])
            .await
            .unwrap();

        let outcome = svc
            .save_attempt(user, &attempt(&slot, 10, 8), &[])
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SaveOutcome::NotImproved {
                current_best: CurrentBest::Remote(id)
            } if id == remote_id
        ));
    }

    #[tokio::test]
    async fn better_attempt_replaces_remote_row_and_clears_mastery() {
        let (svc, repo, store) = service();
        let user = UserId::new(1);
        let slot = SlotKey::general(QuizType::General);
        let cache = LocalCache::for_user(store, user);

        svc.save_attempt(user, &attempt(&slot, 10, 5), &answers(1))
            .await
            .unwrap();
        cache
            .store_mastery(&edu_core::model::MasteryMap::default())
            .unwrap();

        let better = attempt(&slot, 10, 7);
        let outcome = svc.save_attempt(user, &better, &answers(3)).await.unwrap();
        let SaveOutcome::Saved {
            remote_id,
            replaced,
        } = outcome
        else {
            panic!("expected saved, got {outcome:?}");
        };
        assert!(replaced);
        assert_eq!(repo.answer_count(remote_id), 3);
        assert!(cache.mastery().is_none());
        assert_eq!(cache.best_attempt(&slot), Some(better));
    }

    #[tokio::test]
    async fn offline_save_keeps_attempt_locally() {
        let (svc, repo, store) = service();
        let user = UserId::new(1);
        let slot = SlotKey::general(QuizType::Practice);
        repo.set_offline(true);

        let a = attempt(&slot, 4, 3);
        let outcome = svc.save_attempt(user, &a, &[]).await.unwrap();
        match outcome {
            SaveOutcome::LocalOnly { error } => assert!(error.is_connectivity()),
            other => panic!("expected local-only, got {other:?}"),
        }
        assert_eq!(
            LocalCache::for_user(store, user).best_attempt(&slot),
            Some(a)
        );

        repo.set_offline(false);
        assert!(repo.find_best(user, &slot).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_is_fetched_once_then_served_from_cache() {
        let (svc, repo, _) = service();
        let user = UserId::new(2);
        let older = Attempt::new(
            AttemptId::generate(),
            SlotKey::general(QuizType::General),
            fixed_now() - Duration::days(2),
            5,
            3,
            2,
        )
        .unwrap();
        repo.insert_best(user, &older, &[]).await.unwrap();

        assert_eq!(svc.history(user).await.unwrap(), vec![older.clone()]);

        repo.set_offline(true);
        assert_eq!(svc.history(user).await.unwrap(), vec![older]);
    }

    #[tokio::test]
    async fn save_on_fresh_cache_does_not_hide_remote_history() {
        let (svc, repo, _) = service();
        let user = UserId::new(3);
        let logica = attempt(&SlotKey::new(QuizType::Area, Some("Lógica"), None), 10, 6);
        let portugues = attempt(&SlotKey::new(QuizType::Area, Some("Português"), None), 10, 8);
        repo.insert_best(user, &logica, &[]).await.unwrap();
        repo.insert_best(user, &portugues, &[]).await.unwrap();

        let general = attempt(&SlotKey::general(QuizType::General), 20, 11);
        let outcome = svc.save_attempt(user, &general, &[]).await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved { replaced: false, .. }));

        let history = svc.history(user).await.unwrap();
        assert_eq!(history.len(), 3);
        for expected in [&logica, &portugues, &general] {
            assert!(history.contains(expected));
        }

        let later = attempt(&SlotKey::general(QuizType::General), 20, 19);
        svc.save_attempt(user, &later, &[]).await.unwrap();
        repo.set_offline(true);
        let cached = svc.history(user).await.unwrap();
        assert_eq!(cached.len(), 3);
        assert!(cached.contains(&later));
        assert!(!cached.contains(&general));
    }

    #[tokio::test]
    async fn best_attempt_falls_back_to_remote() {
        let (svc, repo, _) = service();
        let user = UserId::new(1);
        let slot = SlotKey::new(QuizType::Discipline, Some("Lógica"), Some("Proposições"));
        let a = attempt(&slot, 8, 8);
        repo.insert_best(user, &a, &[]).await.unwrap();

        assert_eq!(svc.best_attempt(user, &slot).await.unwrap(), Some(a));
        assert!(
            svc.best_attempt(user, &SlotKey::general(QuizType::General))
                .await
                .unwrap()
                .is_none()
        );
    }
}
