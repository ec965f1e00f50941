use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edu_core::model::{
    AnswerRecord, AreaTally, Attempt, Question, QuestionId, RemoteAttemptId, SlotKey, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("local store error: {0}")]
    Local(String),
}

impl StorageError {
    /// True when the backend could not be reached at all.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StorageError::Connection(_))
    }
}

/// An attempt as held by remote storage, with its row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttempt {
    pub remote_id: RemoteAttemptId,
    pub attempt: Attempt,
}

/// Narrows a question-bank query; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    pub area: Option<String>,
    pub disciplina: Option<String>,
}

impl QuestionFilter {
    #[must_use]
    pub fn for_slot(slot: &SlotKey) -> Self {
        Self {
            area: slot.area().map(str::to_owned),
            disciplina: slot.disciplina().map(str::to_owned),
        }
    }

    #[must_use]
    pub fn matches(&self, question: &Question) -> bool {
        let area_ok = self.area.is_none() || self.area == question.area;
        let disciplina_ok = self.disciplina.is_none() || self.disciplina == question.disciplina;
        area_ok && disciplina_ok
    }
}

/// Public profile of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub user_id: UserId,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Best-attempt records and their per-question answers.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Fetch the stored best attempt for a slot, matching absent area/discipline as null.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn find_best(
        &self,
        user: UserId,
        slot: &SlotKey,
    ) -> Result<Option<StoredAttempt>, StorageError>;

    /// Insert a new best attempt with its answers and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn insert_best(
        &self,
        user: UserId,
        attempt: &Attempt,
        answers: &[AnswerRecord],
    ) -> Result<RemoteAttemptId, StorageError>;

    /// Overwrite the attempt stored under `remote_id` and swap its answer rows.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such row belongs to `user`.
    async fn replace_best(
        &self,
        user: UserId,
        remote_id: RemoteAttemptId,
        attempt: &Attempt,
        answers: &[AnswerRecord],
    ) -> Result<(), StorageError>;

    /// All stored attempts for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_attempts(&self, user: UserId) -> Result<Vec<StoredAttempt>, StorageError>;

    /// Per-area answer tallies over every attempt that counts toward mastery.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn mastery_tallies(&self, user: UserId) -> Result<Vec<AreaTally>, StorageError>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert or update a question-bank entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Questions matching `filter`, ordered by id, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_questions(
        &self,
        filter: &QuestionFilter,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_profile(&self, user: UserId) -> Result<Option<Profile>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError>;
}

/// Per-user counters limiting AI chat usage.
#[async_trait]
pub trait ChatCreditRepository: Send + Sync {
    /// Remaining credits, or `None` if the user has no counter yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn remaining(&self, user: UserId) -> Result<Option<u32>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the counter cannot be stored.
    async fn set_credits(&self, user: UserId, credits: u32) -> Result<(), StorageError>;

    /// Spend one credit and return how many remain.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` without a counter and
    /// `StorageError::Conflict` when no credits remain.
    async fn consume(&self, user: UserId) -> Result<u32, StorageError>;
}

#[derive(Debug, Clone)]
struct AttemptRow {
    remote_id: RemoteAttemptId,
    user: UserId,
    attempt: Attempt,
    answers: Vec<AnswerRecord>,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// `set_offline(true)` makes every call fail with `StorageError::Connection`,
/// which is how tests simulate an unreachable backend.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    attempts: Arc<Mutex<Vec<AttemptRow>>>,
    next_attempt_id: Arc<AtomicI64>,
    questions: Arc<Mutex<BTreeMap<QuestionId, Question>>>,
    profiles: Arc<Mutex<HashMap<UserId, Profile>>>,
    credits: Arc<Mutex<HashMap<UserId, u32>>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of answer rows stored for an attempt row (test helper).
    #[must_use]
    pub fn answer_count(&self, remote_id: RemoteAttemptId) -> usize {
        self.attempts.lock().map_or(0, |rows| {
            rows.iter()
                .find(|r| r.remote_id == remote_id)
                .map_or(0, |r| r.answers.len())
        })
    }

    fn online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("backend unreachable".into()));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn find_best(
        &self,
        user: UserId,
        slot: &SlotKey,
    ) -> Result<Option<StoredAttempt>, StorageError> {
        self.online()?;
        let guard = lock(&self.attempts)?;
        Ok(guard
            .iter()
            .find(|r| r.user == user && r.attempt.slot_key() == *slot)
            .map(|r| StoredAttempt {
                remote_id: r.remote_id,
                attempt: r.attempt.clone(),
            }))
    }

    async fn insert_best(
        &self,
        user: UserId,
        attempt: &Attempt,
        answers: &[AnswerRecord],
    ) -> Result<RemoteAttemptId, StorageError> {
        self.online()?;
        let mut guard = lock(&self.attempts)?;
        let remote_id = self.next_attempt_id.fetch_add(1, Ordering::SeqCst) + 1;
        guard.push(AttemptRow {
            remote_id,
            user,
            attempt: attempt.clone(),
            answers: answers.to_vec(),
        });
        Ok(remote_id)
    }

    async fn replace_best(
        &self,
        user: UserId,
        remote_id: RemoteAttemptId,
        attempt: &Attempt,
        answers: &[AnswerRecord],
    ) -> Result<(), StorageError> {
        self.online()?;
        let mut guard = lock(&self.attempts)?;
        let row = guard
            .iter_mut()
            .find(|r| r.remote_id == remote_id && r.user == user)
            .ok_or(StorageError::NotFound)?;
        row.attempt = attempt.clone();
        row.answers = answers.to_vec();
        Ok(())
    }

    async fn list_attempts(&self, user: UserId) -> Result<Vec<StoredAttempt>, StorageError> {
        self.online()?;
        let guard = lock(&self.attempts)?;
        let mut out: Vec<StoredAttempt> = guard
            .iter()
            .filter(|r| r.user == user)
            .map(|r| StoredAttempt {
                remote_id: r.remote_id,
                attempt: r.attempt.clone(),
            })
            .collect();
        out.sort_by(|a, b| {
            b.attempt
                .completed_at()
                .cmp(&a.attempt.completed_at())
                .then(b.remote_id.cmp(&a.remote_id))
        });
        Ok(out)
    }

    async fn mastery_tallies(&self, user: UserId) -> Result<Vec<AreaTally>, StorageError> {
        self.online()?;
        let guard = lock(&self.attempts)?;
        let rows = guard
            .iter()
            .filter(|r| r.user == user)
            .flat_map(|r| r.answers.iter().map(move |a| (r.attempt.quiz_type(), a)));
        Ok(AreaTally::accumulate(rows))
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        self.online()?;
        let mut guard = lock(&self.questions)?;
        guard.insert(question.id, question.clone());
        Ok(())
    }

    async fn list_questions(
        &self,
        filter: &QuestionFilter,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        self.online()?;
        let guard = lock(&self.questions)?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(guard
            .values()
            .filter(|q| filter.matches(q))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_profile(&self, user: UserId) -> Result<Option<Profile>, StorageError> {
        self.online()?;
        let guard = lock(&self.profiles)?;
        Ok(guard.get(&user).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        self.online()?;
        let mut guard = lock(&self.profiles)?;
        guard.insert(profile.user_id, profile.clone());
        Ok(())
    }
}

#[async_trait]
impl ChatCreditRepository for InMemoryRepository {
    async fn remaining(&self, user: UserId) -> Result<Option<u32>, StorageError> {
        self.online()?;
        let guard = lock(&self.credits)?;
        Ok(guard.get(&user).copied())
    }

    async fn set_credits(&self, user: UserId, credits: u32) -> Result<(), StorageError> {
        self.online()?;
        let mut guard = lock(&self.credits)?;
        guard.insert(user, credits);
        Ok(())
    }

    async fn consume(&self, user: UserId) -> Result<u32, StorageError> {
        self.online()?;
        let mut guard = lock(&self.credits)?;
        let credits = guard.get_mut(&user).ok_or(StorageError::NotFound)?;
        if *credits == 0 {
            return Err(StorageError::Conflict);
        }
        *credits -= 1;
        Ok(*credits)
    }
}

/// Aggregates the remote repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub attempts: Arc<dyn AttemptRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub chat_credits: Arc<dyn ChatCreditRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wraps one repository that implements every trait.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: AttemptRepository
            + QuestionRepository
            + ProfileRepository
            + ChatCreditRepository
            + Clone
            + 'static,
    {
        Self {
            attempts: Arc::new(repo.clone()),
            questions: Arc::new(repo.clone()),
            profiles: Arc::new(repo.clone()),
            chat_credits: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edu_core::model::{AttemptId, QuizType};
    use edu_core::time::fixed_now;

    fn attempt(slot: SlotKey, total: u32, correct: u32) -> Attempt {
        Attempt::new(AttemptId::generate(), slot, fixed_now(), total, correct, total - correct)
            .unwrap()
    }

    fn answer(id: u64, area: &str, correct: bool) -> AnswerRecord {
        AnswerRecord {
            question_id: QuestionId::new(id),
            area: Some(area.to_owned()),
            selected_option: Some(0),
            is_correct: correct,
        }
    }

    #[tokio::test]
    async fn find_best_matches_null_area_exactly() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);
        let general = SlotKey::general(QuizType::General);
        let literal = SlotKey::new(QuizType::General, Some("general"), None);

        let id = repo
            .insert_best(user, &attempt(general.clone(), 10, 5), &[])
            .await
            .unwrap();

        let found = repo.find_best(user, &general).await.unwrap().unwrap();
        assert_eq!(found.remote_id, id);
        assert!(repo.find_best(user, &literal).await.unwrap().is_none());
        assert!(repo.find_best(UserId::new(2), &general).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replace_best_swaps_answers() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);
        let slot = SlotKey::new(QuizType::Area, Some("Lógica"), None);
        let id = repo
            .insert_best(user, &attempt(slot.clone(), 2, 1), &[answer(1, "Lógica", true), answer(2, "Lógica", false)])
            .await
            .unwrap();

        let better = attempt(slot.clone(), 2, 2);
        repo.replace_best(user, id, &better, &[answer(3, "Lógica", true)])
            .await
            .unwrap();

        assert_eq!(repo.answer_count(id), 1);
        let stored = repo.find_best(user, &slot).await.unwrap().unwrap();
        assert_eq!(stored.attempt, better);

        let err = repo
            .replace_best(UserId::new(2), id, &better, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn offline_repository_reports_connection_errors() {
        let repo = InMemoryRepository::new();
        repo.set_offline(true);
        let err = repo
            .find_best(UserId::new(1), &SlotKey::general(QuizType::General))
            .await
            .unwrap_err();
        assert!(err.is_connectivity());
    }

    #[tokio::test]
    async fn consume_decrements_until_empty() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);
        assert!(matches!(repo.consume(user).await, Err(StorageError::NotFound)));

        repo.set_credits(user, 1).await.unwrap();
        assert_eq!(repo.consume(user).await.unwrap(), 0);
        assert!(matches!(repo.consume(user).await, Err(StorageError::Conflict)));
        assert_eq!(repo.remaining(user).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn tallies_exclude_practice_attempts() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);
        repo.insert_best(
            user,
            &attempt(SlotKey::general(QuizType::General), 2, 1),
            &[answer(1, "Lógica", true), answer(2, "Lógica", false)],
        )
        .await
        .unwrap();
        repo.insert_best(
            user,
            &attempt(SlotKey::general(QuizType::Practice), 1, 1),
            &[answer(3, "Lógica", true)],
        )
        .await
        .unwrap();

        let tallies = repo.mastery_tallies(user).await.unwrap();
        assert_eq!(tallies.len(), 1);
        assert_eq!(tallies[0].correct, 1);
        assert_eq!(tallies[0].attempted, 2);
    }
}
