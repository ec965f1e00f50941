use edu_core::model::{
    AnswerRecord, AreaTally, Attempt, QuizType, RemoteAttemptId, SlotKey, UserId,
};
use sqlx::{Sqlite, Transaction};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_attempt_row, map_tally_row, question_id_to_i64, usize_i64},
};
use crate::repository::{AttemptRepository, StorageError, StoredAttempt};

async fn insert_answers(
    tx: &mut Transaction<'_, Sqlite>,
    attempt_id: RemoteAttemptId,
    answers: &[AnswerRecord],
) -> Result<(), StorageError> {
    for answer in answers {
        let selected = answer
            .selected_option
            .map(|o| usize_i64("selected_option", o))
            .transpose()?;
        sqlx::query(
            r"
                INSERT INTO attempt_answers (
                    attempt_id, question_id, area, selected_option, is_correct
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(attempt_id)
        .bind(question_id_to_i64(answer.question_id)?)
        .bind(answer.area.as_deref())
        .bind(selected)
        .bind(i64::from(answer.is_correct))
        .execute(&mut **tx)
        .await
        .map_err(conn)?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn find_best(
        &self,
        user: UserId,
        slot: &SlotKey,
    ) -> Result<Option<StoredAttempt>, StorageError> {
        // `IS` so that a NULL area/disciplina only matches NULL.
        let row = sqlx::query(
            r"
                SELECT
                    id, local_id, quiz_type, area, disciplina, completed_at,
                    total_questions, correct_count, incorrect_count
                FROM attempts
                WHERE user_id = ?1 AND quiz_type = ?2 AND area IS ?3 AND disciplina IS ?4
                ORDER BY percentage DESC, id ASC
                LIMIT 1
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(slot.quiz_type().as_str())
        .bind(slot.area())
        .bind(slot.disciplina())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_attempt_row).transpose()
    }

    async fn insert_best(
        &self,
        user: UserId,
        attempt: &Attempt,
        answers: &[AnswerRecord],
    ) -> Result<RemoteAttemptId, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
                INSERT INTO attempts (
                    user_id, local_id, quiz_type, area, disciplina, completed_at,
                    total_questions, correct_count, incorrect_count, percentage
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(attempt.id().to_string())
        .bind(attempt.quiz_type().as_str())
        .bind(attempt.area())
        .bind(attempt.disciplina())
        .bind(attempt.completed_at())
        .bind(i64::from(attempt.total_questions()))
        .bind(i64::from(attempt.correct_count()))
        .bind(i64::from(attempt.incorrect_count()))
        .bind(i64::from(attempt.percentage()))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        let attempt_id = res.last_insert_rowid();
        insert_answers(&mut tx, attempt_id, answers).await?;

        tx.commit().await.map_err(conn)?;
        Ok(attempt_id)
    }

    async fn replace_best(
        &self,
        user: UserId,
        remote_id: RemoteAttemptId,
        attempt: &Attempt,
        answers: &[AnswerRecord],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
                UPDATE attempts SET
                    local_id = ?3,
                    quiz_type = ?4,
                    area = ?5,
                    disciplina = ?6,
                    completed_at = ?7,
                    total_questions = ?8,
                    correct_count = ?9,
                    incorrect_count = ?10,
                    percentage = ?11
                WHERE id = ?1 AND user_id = ?2
            ",
        )
        .bind(remote_id)
        .bind(id_i64("user_id", user.value())?)
        .bind(attempt.id().to_string())
        .bind(attempt.quiz_type().as_str())
        .bind(attempt.area())
        .bind(attempt.disciplina())
        .bind(attempt.completed_at())
        .bind(i64::from(attempt.total_questions()))
        .bind(i64::from(attempt.correct_count()))
        .bind(i64::from(attempt.incorrect_count()))
        .bind(i64::from(attempt.percentage()))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        sqlx::query("DELETE FROM attempt_answers WHERE attempt_id = ?1")
            .bind(remote_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        insert_answers(&mut tx, remote_id, answers).await?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn list_attempts(&self, user: UserId) -> Result<Vec<StoredAttempt>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, local_id, quiz_type, area, disciplina, completed_at,
                    total_questions, correct_count, incorrect_count
                FROM attempts
                WHERE user_id = ?1
                ORDER BY completed_at DESC, id DESC
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }

    async fn mastery_tallies(&self, user: UserId) -> Result<Vec<AreaTally>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    aa.area AS area,
                    SUM(aa.is_correct) AS correct,
                    COUNT(*) AS attempted
                FROM attempt_answers aa
                JOIN attempts a ON a.id = aa.attempt_id
                WHERE a.user_id = ?1 AND a.quiz_type != ?2 AND aa.area IS NOT NULL
                GROUP BY aa.area
                ORDER BY aa.area ASC
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(QuizType::Practice.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_tally_row(&row)?);
        }
        Ok(out)
    }
}
