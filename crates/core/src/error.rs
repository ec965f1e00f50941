use thiserror::Error;

use crate::model::{ActiveSessionError, AttemptError, QuestionError};

/// Any validation error raised by the model.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Session(#[from] ActiveSessionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_errors_convert() {
        let err: Error = AttemptError::NoQuestions.into();
        assert!(matches!(err, Error::Attempt(_)));
        let err: Error = ActiveSessionError::Empty.into();
        assert_eq!(err.to_string(), "no questions available for session");
    }
}
