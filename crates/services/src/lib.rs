#![forbid(unsafe_code)]

pub mod app_services;
pub mod attempt_service;
pub mod chat_service;
pub mod config;
pub mod error;
pub mod mastery_service;
pub mod quiz_service;
pub mod review_queue_service;

pub use edu_core::Clock;

pub use app_services::AppServices;
pub use attempt_service::{AttemptService, CurrentBest, SaveOutcome};
pub use chat_service::{ChatReply, ChatService};
pub use config::{AppConfig, ChatConfig};
pub use error::{
    AppServicesError, AttemptServiceError, ChatError, ConfigError, MasteryError, QuizError,
    ReviewQueueError,
};
pub use mastery_service::MasteryService;
pub use quiz_service::{AnswerFeedback, FinishedQuiz, QuizService};
pub use review_queue_service::ReviewQueueService;
