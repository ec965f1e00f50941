use async_trait::async_trait;
use edu_core::model::UserId;

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_profile_row},
};
use crate::repository::{Profile, ProfileRepository, StorageError};

#[async_trait]
impl ProfileRepository for SqliteRepository {
    async fn get_profile(&self, user: UserId) -> Result<Option<Profile>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, display_name, created_at
                FROM profiles
                WHERE user_id = ?1
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_profile_row).transpose()
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO profiles (user_id, display_name, created_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(user_id) DO UPDATE SET
                    -- created_at stays as first inserted
                    display_name = excluded.display_name
            ",
        )
        .bind(id_i64("user_id", profile.user_id.value())?)
        .bind(profile.display_name.as_str())
        .bind(profile.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
