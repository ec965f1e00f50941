use std::sync::Arc;

use log::{debug, info};
use rand::rng;
use rand::seq::SliceRandom;

use edu_core::Clock;
use edu_core::model::{
    ActiveSession, ActiveSessionError, Attempt, AttemptId, Question, QuizType, SlotKey, UserId,
};
use storage::local::{KeyValueStore, LocalCache};
use storage::repository::{QuestionFilter, QuestionRepository};

use crate::attempt_service::{AttemptService, SaveOutcome};
use crate::error::QuizError;
use crate::review_queue_service::ReviewQueueService;

/// Upper bound on questions pulled from the bank before shuffling.
const QUESTION_POOL_LIMIT: u32 = 500;

/// Feedback for one answered question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub question: Question,
    pub selected: usize,
    pub correct: bool,
}

/// A finished quiz and what reconciliation did with it.
#[derive(Debug)]
pub struct FinishedQuiz {
    pub attempt: Attempt,
    pub outcome: SaveOutcome,
}

/// Drives a quiz from question draw to saved attempt, snapshotting as it goes.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    questions: Arc<dyn QuestionRepository>,
    store: Arc<dyn KeyValueStore>,
    review_queue: Arc<ReviewQueueService>,
    attempts: Arc<AttemptService>,
    shuffle: bool,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionRepository>,
        store: Arc<dyn KeyValueStore>,
        review_queue: Arc<ReviewQueueService>,
        attempts: Arc<AttemptService>,
    ) -> Self {
        Self {
            clock,
            questions,
            store,
            review_queue,
            attempts,
            shuffle: true,
        }
    }

    /// Keep drawn questions in storage order (for deterministic tests).
    #[must_use]
    pub fn without_shuffle(mut self) -> Self {
        self.shuffle = false;
        self
    }

    fn cache(&self, user: UserId) -> LocalCache {
        LocalCache::for_user(Arc::clone(&self.store), user)
    }

    //
    // ─── SNAPSHOTS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn snapshot(&self, user: UserId, slot: &SlotKey) -> Option<ActiveSession> {
        self.cache(user).load_session(slot)
    }

    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the snapshot cannot be written.
    pub fn save_snapshot(&self, user: UserId, session: &ActiveSession) -> Result<(), QuizError> {
        self.cache(user).save_session(session)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the snapshot cannot be removed.
    pub fn clear_snapshot(&self, user: UserId, slot: &SlotKey) -> Result<(), QuizError> {
        self.cache(user).clear_session(slot)?;
        Ok(())
    }

    //
    // ─── FLOW ──────────────────────────────────────────────────────────────────
    //

    /// Resume the stored quiz for `slot`, or start a new one of up to `count` questions.
    ///
    /// Review quizzes draw from the user's review queue; every other type
    /// draws from the question bank filtered by area and discipline.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoQuestions` when nothing matches the slot, or a
    /// storage error if the draw or the snapshot fails.
    pub async fn start(
        &self,
        user: UserId,
        slot: &SlotKey,
        count: usize,
    ) -> Result<ActiveSession, QuizError> {
        if let Some(session) = self.snapshot(user, slot) {
            debug!(
                "resuming {slot} at question {} of {}",
                session.current_index() + 1,
                session.questions().len()
            );
            return Ok(session);
        }

        let mut questions = self.draw(user, slot).await?;
        if self.shuffle {
            questions.shuffle(&mut rng());
        }
        questions.truncate(count);
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }

        let session = ActiveSession::new(slot.clone(), questions, self.clock.now())?;
        self.save_snapshot(user, &session)?;
        info!(
            "started {slot} quiz with {} questions",
            session.questions().len()
        );
        Ok(session)
    }

    async fn draw(&self, user: UserId, slot: &SlotKey) -> Result<Vec<Question>, QuizError> {
        let filter = QuestionFilter::for_slot(slot);
        if slot.quiz_type() == QuizType::Review {
            return Ok(self
                .review_queue
                .entries(user)
                .into_questions()
                .into_iter()
                .filter(|q| filter.matches(q))
                .collect());
        }
        Ok(self
            .questions
            .list_questions(&filter, QUESTION_POOL_LIMIT)
            .await?)
    }

    /// Answer the current question, update the review queue and move on.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` for an invalid answer, or a storage error
    /// if the queue or snapshot cannot be written.
    pub fn answer(
        &self,
        user: UserId,
        session: &mut ActiveSession,
        option: usize,
    ) -> Result<AnswerFeedback, QuizError> {
        let now = self.clock.now();
        let question = session
            .current_question()
            .cloned()
            .ok_or(ActiveSessionError::Finished)?;
        let correct = session.answer(option, now)?;

        self.review_queue
            .record_answer(user, &question, correct, session.quiz_type())?;
        session.advance(now);
        self.save_snapshot(user, session)?;

        Ok(AnswerFeedback {
            question,
            selected: option,
            correct,
        })
    }

    /// # Errors
    ///
    /// Returns `QuizError::Session` for an out-of-range index, or a storage
    /// error if the snapshot cannot be written.
    pub fn go_to(
        &self,
        user: UserId,
        session: &mut ActiveSession,
        index: usize,
    ) -> Result<(), QuizError> {
        session.go_to(index, self.clock.now())?;
        self.save_snapshot(user, session)
    }

    /// Score the quiz, drop its snapshot and reconcile it against the stored best.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if the session cannot be scored or the local cache
    /// cannot be written. Remote failures show up in the outcome instead.
    pub async fn finish(
        &self,
        user: UserId,
        session: ActiveSession,
    ) -> Result<FinishedQuiz, QuizError> {
        let attempt = session.to_attempt(AttemptId::generate(), self.clock.now())?;
        let answers = session.answer_records();

        self.clear_snapshot(user, &session.slot_key())?;
        let outcome = self.attempts.save_attempt(user, &attempt, &answers).await?;

        info!(
            "finished {} quiz: {}/{} correct ({}%)",
            attempt.quiz_type(),
            attempt.correct_count(),
            attempt.total_questions(),
            attempt.percentage()
        );
        Ok(FinishedQuiz { attempt, outcome })
    }

    /// # Errors
    ///
    /// Returns `QuizError::Storage` if the snapshot cannot be removed.
    pub fn abandon(&self, user: UserId, slot: &SlotKey) -> Result<(), QuizError> {
        self.clear_snapshot(user, slot)
    }
}
