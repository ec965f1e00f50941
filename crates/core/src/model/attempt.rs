use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AttemptId, QuestionId};
use crate::model::quiz::{QuizType, SlotKey};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("attempt has no questions")]
    NoQuestions,

    #[error("correct ({correct}) + incorrect ({incorrect}) exceeds total questions ({total})")]
    CountMismatch {
        total: u32,
        correct: u32,
        incorrect: u32,
    },

    #[error("too many questions for a single attempt: {len}")]
    TooManyQuestions { len: usize },
}

/// Aggregate score of one finished quiz.
///
/// Questions left unanswered count toward `total_questions` but toward neither
/// `correct_count` nor `incorrect_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    id: AttemptId,
    completed_at: DateTime<Utc>,
    quiz_type: QuizType,
    area: Option<String>,
    disciplina: Option<String>,
    total_questions: u32,
    correct_count: u32,
    incorrect_count: u32,
    percentage: u8,
}

impl Attempt {
    /// Build an attempt and derive its percentage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NoQuestions` for an empty quiz and
    /// `AttemptError::CountMismatch` when the answered counts exceed the total.
    pub fn new(
        id: AttemptId,
        slot: SlotKey,
        completed_at: DateTime<Utc>,
        total_questions: u32,
        correct_count: u32,
        incorrect_count: u32,
    ) -> Result<Self, AttemptError> {
        if total_questions == 0 {
            return Err(AttemptError::NoQuestions);
        }
        if correct_count.saturating_add(incorrect_count) > total_questions {
            return Err(AttemptError::CountMismatch {
                total: total_questions,
                correct: correct_count,
                incorrect: incorrect_count,
            });
        }

        let (quiz_type, area, disciplina) = slot.into_parts();
        Ok(Self {
            id,
            completed_at,
            quiz_type,
            area,
            disciplina,
            total_questions,
            correct_count,
            incorrect_count,
            percentage: percentage(correct_count, total_questions),
        })
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn quiz_type(&self) -> QuizType {
        self.quiz_type
    }

    #[must_use]
    pub fn area(&self) -> Option<&str> {
        self.area.as_deref()
    }

    #[must_use]
    pub fn disciplina(&self) -> Option<&str> {
        self.disciplina.as_deref()
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn incorrect_count(&self) -> u32 {
        self.incorrect_count
    }

    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    #[must_use]
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.quiz_type, self.area(), self.disciplina())
    }

    /// Whether this attempt should replace `current` as the best of its slot.
    ///
    /// Requires a strictly higher percentage over at least as many questions;
    /// a tie is not an improvement.
    #[must_use]
    pub fn improves_on(&self, current: &Attempt) -> bool {
        self.percentage > current.percentage && self.total_questions >= current.total_questions
    }
}

/// Rounded share of `correct` over `total`, in whole percent (halves round up).
#[must_use]
pub fn percentage(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    let rounded = (correct * 200 + total) / (total * 2);
    u8::try_from(rounded).unwrap_or(100)
}

/// One answered (or skipped) question belonging to an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub area: Option<String>,
    pub selected_option: Option<usize>,
    pub is_correct: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn attempt(total: u32, correct: u32) -> Attempt {
        Attempt::new(
            AttemptId::generate(),
            SlotKey::new(QuizType::Area, Some("Lógica"), None),
            fixed_now(),
            total,
            correct,
            total - correct,
        )
        .unwrap()
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(15, 20), 75);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn rejects_empty_and_overcounted_attempts() {
        let slot = SlotKey::general(QuizType::General);
        assert_eq!(
            Attempt::new(AttemptId::generate(), slot.clone(), fixed_now(), 0, 0, 0).unwrap_err(),
            AttemptError::NoQuestions
        );
        assert!(matches!(
            Attempt::new(AttemptId::generate(), slot, fixed_now(), 10, 6, 5),
            Err(AttemptError::CountMismatch { .. })
        ));
    }

    #[test]
    fn improvement_requires_higher_percentage_and_no_fewer_questions() {
        let base = attempt(20, 12);
        assert!(attempt(20, 15).improves_on(&base));
        assert!(attempt(25, 20).improves_on(&base));
        assert!(!attempt(15, 14).improves_on(&base));
        assert!(!attempt(20, 12).improves_on(&base));
        assert!(!attempt(20, 10).improves_on(&base));
    }

    #[test]
    fn slot_key_reflects_attempt_fields() {
        let a = attempt(10, 5);
        assert_eq!(a.slot_key(), SlotKey::new(QuizType::Area, Some("Lógica"), None));
        assert_eq!(a.percentage(), 50);
    }

    #[test]
    fn serializes_through_json() {
        let a = attempt(4, 3);
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains("\"quiz_type\":\"area\""));
        let back: Attempt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
