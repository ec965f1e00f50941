use std::sync::Arc;

use log::debug;

use edu_core::model::{MasteryMap, UserId};
use storage::local::{KeyValueStore, LocalCache};
use storage::repository::AttemptRepository;

use crate::error::MasteryError;

/// Per-area mastery, cached locally until an accepted attempt invalidates it.
#[derive(Clone)]
pub struct MasteryService {
    attempts: Arc<dyn AttemptRepository>,
    store: Arc<dyn KeyValueStore>,
}

impl MasteryService {
    #[must_use]
    pub fn new(attempts: Arc<dyn AttemptRepository>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { attempts, store }
    }

    /// Cached mastery map, or a fresh one computed from remote tallies.
    ///
    /// # Errors
    ///
    /// Returns `MasteryError::Storage` if the tallies cannot be fetched or the
    /// result cannot be cached.
    pub async fn mastery(&self, user: UserId) -> Result<MasteryMap, MasteryError> {
        let cache = LocalCache::for_user(Arc::clone(&self.store), user);
        if let Some(cached) = cache.mastery() {
            debug!("mastery cache hit for user {user}");
            return Ok(cached);
        }

        let tallies = self.attempts.mastery_tallies(user).await?;
        let map = MasteryMap::from_tallies(&tallies);
        cache.store_mastery(&map)?;
        debug!("computed mastery for user {user} over {} areas", map.len());
        Ok(map)
    }

    /// # Errors
    ///
    /// Returns `MasteryError::Storage` if the cached entry cannot be removed.
    pub fn invalidate(&self, user: UserId) -> Result<(), MasteryError> {
        LocalCache::for_user(Arc::clone(&self.store), user).clear_mastery()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edu_core::model::{AnswerRecord, Attempt, AttemptId, QuestionId, QuizType, SlotKey};
    use edu_core::time::fixed_now;
    use storage::InMemoryRepository;
    use storage::local::MemoryStore;

    fn answer(id: u64, area: &str, correct: bool) -> AnswerRecord {
        AnswerRecord {
            question_id: QuestionId::new(id),
            area: Some(area.into()),
            selected_option: Some(0),
            is_correct: correct,
        }
    }

    async fn record(repo: &InMemoryRepository, quiz_type: QuizType, answers: &[AnswerRecord]) {
        let total = u32::try_from(answers.len()).unwrap();
        let correct = u32::try_from(answers.iter().filter(|a| a.is_correct).count()).unwrap();
        let attempt = Attempt::new(
            AttemptId::generate(),
            SlotKey::general(quiz_type),
            fixed_now(),
            total,
            correct,
            total - correct,
        )
        .unwrap();
        repo.insert_best(UserId::new(1), &attempt, answers)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn computes_then_serves_from_cache() {
        let repo = InMemoryRepository::new();
        let svc = MasteryService::new(Arc::new(repo.clone()), Arc::new(MemoryStore::new()));
        let user = UserId::new(1);

        record(
            &repo,
            QuizType::General,
            &[
                answer(1, "Lógica", true),
                answer(2, "Lógica", false),
                answer(3, "Português", true),
            ],
        )
        .await;

        let map = svc.mastery(user).await.unwrap();
        assert_eq!(map.get("Lógica"), Some(50));
        assert_eq!(map.get("Português"), Some(100));

        repo.set_offline(true);
        assert_eq!(svc.mastery(user).await.unwrap(), map);
    }

    #[tokio::test]
    async fn invalidate_forces_recompute() {
        let repo = InMemoryRepository::new();
        let svc = MasteryService::new(Arc::new(repo.clone()), Arc::new(MemoryStore::new()));
        let user = UserId::new(1);

        record(&repo, QuizType::General, &[answer(1, "Lógica", false)]).await;
        assert_eq!(svc.mastery(user).await.unwrap().get("Lógica"), Some(0));

        record(&repo, QuizType::Area, &[answer(2, "Lógica", true)]).await;
        assert_eq!(svc.mastery(user).await.unwrap().get("Lógica"), Some(0));

        svc.invalidate(user).unwrap();
        assert_eq!(svc.mastery(user).await.unwrap().get("Lógica"), Some(50));
    }

    #[tokio::test]
    async fn practice_answers_are_ignored() {
        let repo = InMemoryRepository::new();
        let svc = MasteryService::new(Arc::new(repo.clone()), Arc::new(MemoryStore::new()));

        record(&repo, QuizType::Practice, &[answer(1, "Lógica", true)]).await;
        assert!(svc.mastery(UserId::new(1)).await.unwrap().is_empty());
    }
}
