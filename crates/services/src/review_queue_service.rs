use std::sync::Arc;

use log::debug;

use edu_core::model::{Question, QuestionId, QuizType, ReviewQueue, UserId};
use storage::local::{KeyValueStore, LocalCache};

use crate::error::ReviewQueueError;

/// Questions a user got wrong, kept locally until answered right in review.
#[derive(Clone)]
pub struct ReviewQueueService {
    store: Arc<dyn KeyValueStore>,
}

impl ReviewQueueService {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn cache(&self, user: UserId) -> LocalCache {
        LocalCache::for_user(Arc::clone(&self.store), user)
    }

    #[must_use]
    pub fn entries(&self, user: UserId) -> ReviewQueue {
        self.cache(user).review_queue()
    }

    /// Queue `question`; returns false if it was already queued.
    ///
    /// # Errors
    ///
    /// Returns `ReviewQueueError::Storage` if the queue cannot be written.
    pub fn add(&self, user: UserId, question: Question) -> Result<bool, ReviewQueueError> {
        let cache = self.cache(user);
        let mut queue = cache.review_queue();
        let id = question.id;
        if !queue.add(question) {
            return Ok(false);
        }
        cache.store_review_queue(&queue)?;
        debug!("queued question {id} for review");
        Ok(true)
    }

    /// Drop `id` from the queue; returns false if it was not queued.
    ///
    /// # Errors
    ///
    /// Returns `ReviewQueueError::Storage` if the queue cannot be written.
    pub fn remove(&self, user: UserId, id: QuestionId) -> Result<bool, ReviewQueueError> {
        let cache = self.cache(user);
        let mut queue = cache.review_queue();
        if !queue.remove(id) {
            return Ok(false);
        }
        cache.store_review_queue(&queue)?;
        debug!("question {id} left the review queue");
        Ok(true)
    }

    /// # Errors
    ///
    /// Returns `ReviewQueueError::Storage` if the entry cannot be removed.
    pub fn clear(&self, user: UserId) -> Result<(), ReviewQueueError> {
        self.cache(user).clear_review_queue()?;
        Ok(())
    }

    /// Apply the queue rules to one answered question.
    ///
    /// A wrong answer queues the question. A right answer only dequeues it
    /// during a review quiz.
    ///
    /// # Errors
    ///
    /// Returns `ReviewQueueError::Storage` if the queue cannot be written.
    pub fn record_answer(
        &self,
        user: UserId,
        question: &Question,
        correct: bool,
        quiz_type: QuizType,
    ) -> Result<(), ReviewQueueError> {
        if !correct {
            self.add(user, question.clone())?;
        } else if quiz_type == QuizType::Review {
            self.remove(user, question.id)?;
        }
        Ok(())
    }
}
