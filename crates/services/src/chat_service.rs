use std::sync::Arc;

use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use edu_core::model::UserId;
use storage::repository::{ChatCreditRepository, StorageError};

use crate::config::ChatConfig;
use crate::error::ChatError;

/// Assistant answer plus the credits left after paying for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub reply: String,
    pub link: Option<String>,
    pub remaining_credits: u32,
}

/// Study assistant backed by a JSON webhook, metered by per-user credits.
#[derive(Clone)]
pub struct ChatService {
    client: Client,
    config: Option<ChatConfig>,
    credits: Arc<dyn ChatCreditRepository>,
}

impl ChatService {
    #[must_use]
    pub fn new(config: Option<ChatConfig>, credits: Arc<dyn ChatCreditRepository>) -> Self {
        Self {
            client: Client::new(),
            config,
            credits,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Credits left for `user`; users without a counter have none.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` if the counter cannot be read.
    pub async fn remaining_credits(&self, user: UserId) -> Result<u32, ChatError> {
        Ok(self.credits.remaining(user).await?.unwrap_or(0))
    }

    /// Send `message` to the assistant, optionally with quiz context.
    ///
    /// A credit is spent only once a non-empty reply came back.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Disabled` without a webhook, `ChatError::NoCredits`
    /// when the user is out of credits, and HTTP errors from the webhook.
    pub async fn send(
        &self,
        user: UserId,
        message: &str,
        context: Option<&str>,
    ) -> Result<ChatReply, ChatError> {
        let config = self.config.as_ref().ok_or(ChatError::Disabled)?;

        if self.remaining_credits(user).await? == 0 {
            return Err(ChatError::NoCredits);
        }

        let payload = ChatRequest {
            message,
            user_id: user.value(),
            context,
        };
        let response = self
            .client
            .post(&config.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("chat webhook answered {}", response.status());
            return Err(ChatError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let reply = body
            .reply
            .map(|r| r.trim().to_owned())
            .filter(|r| !r.is_empty())
            .ok_or(ChatError::EmptyReply)?;

        let remaining_credits = self.credits.consume(user).await.map_err(|err| match err {
            StorageError::Conflict | StorageError::NotFound => ChatError::NoCredits,
            other => ChatError::Storage(other),
        })?;
        debug!("chat reply delivered, {remaining_credits} credits left for user {user}");

        Ok(ChatReply {
            reply,
            link: body.link.filter(|l| !l.trim().is_empty()),
            remaining_credits,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    user_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    reply: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::InMemoryRepository;

    fn unreachable_config() -> ChatConfig {
        ChatConfig {
            webhook_url: "http://127.0.0.1:9/chat".into(),
        }
    }

    #[tokio::test]
    async fn disabled_without_webhook() {
        let svc = ChatService::new(None, Arc::new(InMemoryRepository::new()));
        assert!(!svc.enabled());
        let err = svc.send(UserId::new(1), "oi", None).await.unwrap_err();
        assert!(matches!(err, ChatError::Disabled));
    }

    #[tokio::test]
    async fn no_credits_blocks_before_sending() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);
        let svc = ChatService::new(Some(unreachable_config()), Arc::new(repo.clone()));

        let err = svc.send(user, "oi", None).await.unwrap_err();
        assert!(matches!(err, ChatError::NoCredits));

        repo.set_credits(user, 0).await.unwrap();
        let err = svc.send(user, "oi", None).await.unwrap_err();
        assert!(matches!(err, ChatError::NoCredits));
    }

    #[tokio::test]
    async fn failed_request_keeps_credits() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);
        repo.set_credits(user, 3).await.unwrap();
        let svc = ChatService::new(Some(unreachable_config()), Arc::new(repo.clone()));

        let err = svc
            .send(user, "explica crase", Some("Língua Portuguesa"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Http(_)));
        assert_eq!(svc.remaining_credits(user).await.unwrap(), 3);
    }

    #[test]
    fn request_omits_missing_context() {
        let body = serde_json::to_value(ChatRequest {
            message: "oi",
            user_id: 7,
            context: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "message": "oi", "user_id": 7 }));
    }

    #[test]
    fn response_link_is_optional() {
        let body: ChatResponse = serde_json::from_str(r#"{ "reply": "ok" }"#).unwrap();
        assert_eq!(body.reply.as_deref(), Some("ok"));
        assert!(body.link.is_none());
    }
}
