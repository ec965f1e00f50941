use async_trait::async_trait;
use chrono::Utc;
use edu_core::model::UserId;
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{conn, credits_from_i64, id_i64, ser},
};
use crate::repository::{ChatCreditRepository, StorageError};

#[async_trait]
impl ChatCreditRepository for SqliteRepository {
    async fn remaining(&self, user: UserId) -> Result<Option<u32>, StorageError> {
        let row = sqlx::query("SELECT remaining FROM chat_credits WHERE user_id = ?1")
            .bind(id_i64("user_id", user.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let remaining: i64 = row.try_get("remaining").map_err(ser)?;
        credits_from_i64(remaining).map(Some)
    }

    async fn set_credits(&self, user: UserId, credits: u32) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO chat_credits (user_id, remaining, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(user_id) DO UPDATE SET
                    remaining = excluded.remaining,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(i64::from(credits))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn consume(&self, user: UserId) -> Result<u32, StorageError> {
        let user_id = id_i64("user_id", user.value())?;

        let row = sqlx::query(
            r"
                UPDATE chat_credits
                SET remaining = remaining - 1, updated_at = ?2
                WHERE user_id = ?1 AND remaining > 0
                RETURNING remaining
            ",
        )
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => credits_from_i64(row.try_get("remaining").map_err(ser)?),
            None if self.remaining(user).await?.is_some() => Err(StorageError::Conflict),
            None => Err(StorageError::NotFound),
        }
    }
}
