mod attempt;
mod ids;
mod mastery;
mod question;
mod quiz;
mod review_queue;
mod session;

pub use ids::{AttemptId, ParseIdError, QuestionId, RemoteAttemptId, UserId};

pub use attempt::{AnswerRecord, Attempt, AttemptError, percentage};
pub use mastery::{AreaTally, MasteryMap};
pub use question::{Question, QuestionError, option_label};
pub use quiz::{ParseQuizTypeError, QuizType, SlotKey};
pub use review_queue::ReviewQueue;
pub use session::{ActiveSession, ActiveSessionError};
