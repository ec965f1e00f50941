use std::sync::Arc;

use log::info;

use edu_core::model::UserId;
use storage::local::{FileStore, KeyValueStore, MemoryStore};
use storage::repository::{ChatCreditRepository, Profile, ProfileRepository, Storage};

use crate::Clock;
use crate::attempt_service::AttemptService;
use crate::chat_service::ChatService;
use crate::config::AppConfig;
use crate::error::AppServicesError;
use crate::mastery_service::MasteryService;
use crate::quiz_service::QuizService;
use crate::review_queue_service::ReviewQueueService;

/// Assembles app-facing services for the configured user.
#[derive(Clone)]
pub struct AppServices {
    user_id: UserId,
    first_launch: bool,
    attempts: Arc<AttemptService>,
    mastery: Arc<MasteryService>,
    review_queue: Arc<ReviewQueueService>,
    quiz: Arc<QuizService>,
    chat: Arc<ChatService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage, the cache directory or profile
    /// setup fails.
    pub async fn new_sqlite(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.db_url).await?;
        Self::from_storage(storage, local_store(config)?, config, clock).await
    }

    /// Build services backed by in-memory storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the cache directory or profile setup fails.
    pub async fn in_memory(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        Self::from_storage(Storage::in_memory(), local_store(config)?, config, clock).await
    }

    /// # Errors
    ///
    /// Returns `AppServicesError::Storage` if the profile cannot be ensured.
    pub async fn from_storage(
        storage: Storage,
        store: Arc<dyn KeyValueStore>,
        config: &AppConfig,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let first_launch = ensure_profile(
            storage.profiles.as_ref(),
            storage.chat_credits.as_ref(),
            config,
            clock,
        )
        .await?;

        let attempts = Arc::new(AttemptService::new(
            Arc::clone(&storage.attempts),
            Arc::clone(&store),
        ));
        let mastery = Arc::new(MasteryService::new(
            Arc::clone(&storage.attempts),
            Arc::clone(&store),
        ));
        let review_queue = Arc::new(ReviewQueueService::new(Arc::clone(&store)));
        let quiz = Arc::new(QuizService::new(
            clock,
            Arc::clone(&storage.questions),
            Arc::clone(&store),
            Arc::clone(&review_queue),
            Arc::clone(&attempts),
        ));
        let chat = Arc::new(ChatService::new(
            config.chat.clone(),
            Arc::clone(&storage.chat_credits),
        ));

        Ok(Self {
            user_id: config.user_id,
            first_launch,
            attempts,
            mastery,
            review_queue,
            quiz,
            chat,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// True when this run created the user's profile.
    #[must_use]
    pub fn first_launch(&self) -> bool {
        self.first_launch
    }

    #[must_use]
    pub fn attempts(&self) -> Arc<AttemptService> {
        Arc::clone(&self.attempts)
    }

    #[must_use]
    pub fn mastery(&self) -> Arc<MasteryService> {
        Arc::clone(&self.mastery)
    }

    #[must_use]
    pub fn review_queue(&self) -> Arc<ReviewQueueService> {
        Arc::clone(&self.review_queue)
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizService> {
        Arc::clone(&self.quiz)
    }

    #[must_use]
    pub fn chat(&self) -> Arc<ChatService> {
        Arc::clone(&self.chat)
    }
}

fn local_store(config: &AppConfig) -> Result<Arc<dyn KeyValueStore>, AppServicesError> {
    match &config.cache_dir {
        Some(dir) => Ok(Arc::new(FileStore::open(dir.clone())?)),
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

async fn ensure_profile(
    profiles: &dyn ProfileRepository,
    credits: &dyn ChatCreditRepository,
    config: &AppConfig,
    clock: Clock,
) -> Result<bool, AppServicesError> {
    if profiles.get_profile(config.user_id).await?.is_some() {
        return Ok(false);
    }

    profiles
        .upsert_profile(&Profile {
            user_id: config.user_id,
            display_name: config.display_name.clone(),
            created_at: clock.now(),
        })
        .await?;
    if credits.remaining(config.user_id).await?.is_none() {
        credits
            .set_credits(config.user_id, config.chat_credits)
            .await?;
    }
    info!(
        "created profile for user {} with {} chat credits",
        config.user_id, config.chat_credits
    );
    Ok(true)
}
