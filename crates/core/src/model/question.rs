use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::quiz::normalize;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question statement is empty")]
    EmptyStatement,

    #[error("question needs at least two options, got {count}")]
    TooFewOptions { count: usize },

    #[error("correct option {index} is out of range for {count} options")]
    CorrectOptionOutOfRange { index: usize, count: usize },
}

/// A multiple-choice question from the question bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub area: Option<String>,
    pub disciplina: Option<String>,
    pub statement: String,
    pub options: Vec<String>,
    pub correct_option: usize,
    pub explanation: String,
}

impl Question {
    /// Build a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the statement is blank, fewer than two
    /// options are given, or `correct_option` does not index an option.
    pub fn new(
        id: QuestionId,
        area: Option<&str>,
        disciplina: Option<&str>,
        statement: impl Into<String>,
        options: Vec<String>,
        correct_option: usize,
        explanation: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let statement = statement.into();
        if statement.trim().is_empty() {
            return Err(QuestionError::EmptyStatement);
        }
        if options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                count: options.len(),
            });
        }
        if correct_option >= options.len() {
            return Err(QuestionError::CorrectOptionOutOfRange {
                index: correct_option,
                count: options.len(),
            });
        }

        Ok(Self {
            id,
            area: normalize(area),
            disciplina: normalize(disciplina),
            statement,
            options,
            correct_option,
            explanation: explanation.into(),
        })
    }

    #[must_use]
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_option
    }

    /// Letter shown next to the correct option ("A", "B", ...).
    #[must_use]
    pub fn correct_label(&self) -> char {
        option_label(self.correct_option)
    }
}

/// Maps an option index to its display letter.
#[must_use]
pub fn option_label(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .filter(|i| *i < 26)
        .map_or('?', |i| char::from(b'A' + i))
}
