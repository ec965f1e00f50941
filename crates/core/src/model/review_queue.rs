use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;
use crate::model::question::Question;

/// Questions the user answered wrong and has not yet re-answered correctly.
///
/// Entries are unique by question id and kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewQueue {
    entries: Vec<Question>,
}

impl ReviewQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `question` unless its id is already queued. Returns whether it was added.
    pub fn add(&mut self, question: Question) -> bool {
        if self.contains(question.id) {
            return false;
        }
        self.entries.push(question);
        true
    }

    /// Drops the entry for `id`. Returns whether anything was removed.
    pub fn remove(&mut self, id: QuestionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|q| q.id != id);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.entries.iter().any(|q| q.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.entries.iter()
    }

    #[must_use]
    pub fn into_questions(self) -> Vec<Question> {
        self.entries
    }
}

impl FromIterator<Question> for ReviewQueue {
    fn from_iter<I: IntoIterator<Item = Question>>(iter: I) -> Self {
        let mut queue = Self::new();
        for question in iter {
            queue.add(question);
        }
        queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            Some("Lógica"),
            None,
            format!("Q{id}"),
            vec!["a".into(), "b".into()],
            0,
            "",
        )
        .unwrap()
    }

    #[test]
    fn adding_same_id_twice_keeps_one_entry() {
        let mut queue = ReviewQueue::new();
        assert!(queue.add(question(1)));
        assert!(!queue.add(question(1)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn removing_absent_id_is_noop() {
        let mut queue: ReviewQueue = [question(1), question(2)].into_iter().collect();
        let before = queue.clone();
        assert!(!queue.remove(QuestionId::new(9)));
        assert_eq!(queue, before);
    }

    #[test]
    fn remove_keeps_insertion_order_of_the_rest() {
        let mut queue: ReviewQueue = [question(3), question(1), question(2)].into_iter().collect();
        assert!(queue.remove(QuestionId::new(1)));
        let ids: Vec<u64> = queue.iter().map(|q| q.id.value()).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn clear_drops_everything() {
        let mut queue: ReviewQueue = [question(1), question(2)].into_iter().collect();
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn serializes_as_plain_list() {
        let queue: ReviewQueue = [question(1)].into_iter().collect();
        let json = serde_json::to_value(&queue).unwrap();
        assert!(json.is_array());
    }
}
