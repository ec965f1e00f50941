use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::attempt::{AnswerRecord, Attempt, AttemptError};
use crate::model::ids::AttemptId;
use crate::model::question::Question;
use crate::model::quiz::{QuizType, SlotKey};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ActiveSessionError {
    #[error("no questions available for session")]
    Empty,

    #[error("session has no current question")]
    Finished,

    #[error("question {index} was already answered")]
    AlreadyAnswered { index: usize },

    #[error("option {option} is out of range for {count} options")]
    OptionOutOfRange { option: usize, count: usize },

    #[error("question index {index} is out of range for {len} questions")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("snapshot has {answers} answers for {questions} questions")]
    Misaligned { questions: usize, answers: usize },
}

/// In-progress quiz state, persisted so the quiz can be resumed after a reload.
///
/// `answers` is aligned with `questions`; `None` marks a question not answered yet.
/// Deserialization checks the same invariants as construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawActiveSession")]
pub struct ActiveSession {
    quiz_type: QuizType,
    area: Option<String>,
    disciplina: Option<String>,
    questions: Vec<Question>,
    answers: Vec<Option<usize>>,
    current_index: usize,
    updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawActiveSession {
    quiz_type: QuizType,
    area: Option<String>,
    disciplina: Option<String>,
    questions: Vec<Question>,
    answers: Vec<Option<usize>>,
    current_index: usize,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RawActiveSession> for ActiveSession {
    type Error = ActiveSessionError;

    fn try_from(raw: RawActiveSession) -> Result<Self, Self::Error> {
        let slot = SlotKey::new(raw.quiz_type, raw.area.as_deref(), raw.disciplina.as_deref());
        let mut session = Self::new(slot, raw.questions, raw.updated_at)?;

        let len = session.questions.len();
        if raw.answers.len() != len {
            return Err(ActiveSessionError::Misaligned {
                questions: len,
                answers: raw.answers.len(),
            });
        }
        if raw.current_index > len {
            return Err(ActiveSessionError::IndexOutOfRange {
                index: raw.current_index,
                len,
            });
        }
        for (question, answer) in session.questions.iter().zip(&raw.answers) {
            if let Some(option) = answer.filter(|o| *o >= question.options.len()) {
                return Err(ActiveSessionError::OptionOutOfRange {
                    option,
                    count: question.options.len(),
                });
            }
        }

        session.answers = raw.answers;
        session.current_index = raw.current_index;
        Ok(session)
    }
}

impl ActiveSession {
    /// Start a session over `questions` for the given slot.
    ///
    /// # Errors
    ///
    /// Returns `ActiveSessionError::Empty` if `questions` is empty.
    pub fn new(
        slot: SlotKey,
        questions: Vec<Question>,
        now: DateTime<Utc>,
    ) -> Result<Self, ActiveSessionError> {
        if questions.is_empty() {
            return Err(ActiveSessionError::Empty);
        }
        let answers = vec![None; questions.len()];
        let (quiz_type, area, disciplina) = slot.into_parts();
        Ok(Self {
            quiz_type,
            area,
            disciplina,
            questions,
            answers,
            current_index: 0,
            updated_at: now,
        })
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
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.quiz_type, self.area(), self.disciplina())
    }

    #[must_use]
    pub fn disciplina(&self) -> Option<&str> {
        self.disciplina.as_deref()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn answers(&self) -> &[Option<usize>] {
        &self.answers
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    /// True once the cursor has moved past the last question.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current_index >= self.questions.len()
    }

    /// Record `option` for the current question and return whether it was correct.
    ///
    /// The cursor does not move; call [`ActiveSession::advance`] for that.
    ///
    /// # Errors
    ///
    /// Returns `Finished` past the last question, `AlreadyAnswered` on a second
    /// answer to the same question, and `OptionOutOfRange` for a bad option.
    pub fn answer(&mut self, option: usize, now: DateTime<Utc>) -> Result<bool, ActiveSessionError> {
        let index = self.current_index;
        let question = self
            .questions
            .get(index)
            .ok_or(ActiveSessionError::Finished)?;
        let misaligned = ActiveSessionError::Misaligned {
            questions: self.questions.len(),
            answers: self.answers.len(),
        };
        let slot = self.answers.get_mut(index).ok_or(misaligned)?;
        if slot.is_some() {
            return Err(ActiveSessionError::AlreadyAnswered { index });
        }
        if option >= question.options.len() {
            return Err(ActiveSessionError::OptionOutOfRange {
                option,
                count: question.options.len(),
            });
        }

        let correct = question.is_correct(option);
        *slot = Some(option);
        self.updated_at = now;
        Ok(correct)
    }

    /// Move the cursor to the next question (or past the end).
    pub fn advance(&mut self, now: DateTime<Utc>) {
        self.current_index = (self.current_index + 1).min(self.questions.len());
        self.updated_at = now;
    }

    /// Jump to question `index`.
    ///
    /// # Errors
    ///
    /// Returns `ActiveSessionError::IndexOutOfRange` if there is no such question.
    pub fn go_to(&mut self, index: usize, now: DateTime<Utc>) -> Result<(), ActiveSessionError> {
        if index >= self.questions.len() {
            return Err(ActiveSessionError::IndexOutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        self.current_index = index;
        self.updated_at = now;
        Ok(())
    }

    /// Score the session as a finished attempt.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the question count does not fit an attempt.
    pub fn to_attempt(&self, id: AttemptId, completed_at: DateTime<Utc>) -> Result<Attempt, AttemptError> {
        let total = u32::try_from(self.questions.len()).map_err(|_| {
            AttemptError::TooManyQuestions {
                len: self.questions.len(),
            }
        })?;

        let mut correct = 0_u32;
        let mut incorrect = 0_u32;
        for (question, answer) in self.questions.iter().zip(&self.answers) {
            match answer {
                Some(option) if question.is_correct(*option) => correct += 1,
                Some(_) => incorrect += 1,
                None => {}
            }
        }

        Attempt::new(id, self.slot_key(), completed_at, total, correct, incorrect)
    }

    /// Per-question rows for the finished attempt, in question order.
    #[must_use]
    pub fn answer_records(&self) -> Vec<AnswerRecord> {
        self.questions
            .iter()
            .zip(&self.answers)
            .map(|(question, answer)| AnswerRecord {
                question_id: question.id,
                area: question.area.clone(),
                selected_option: *answer,
                is_correct: answer.is_some_and(|o| question.is_correct(o)),
            })
            .collect()
    }
}
