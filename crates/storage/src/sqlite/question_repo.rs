use async_trait::async_trait;
use edu_core::model::Question;

use super::{
    SqliteRepository,
    mapping::{conn, map_question_row, question_id_to_i64, ser, usize_i64},
};
use crate::repository::{QuestionFilter, QuestionRepository, StorageError};

#[async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let options = serde_json::to_string(&question.options).map_err(ser)?;

        sqlx::query(
            r"
                INSERT INTO questions (
                    id, area, disciplina, statement, options, correct_option, explanation
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    area = excluded.area,
                    disciplina = excluded.disciplina,
                    statement = excluded.statement,
                    options = excluded.options,
                    correct_option = excluded.correct_option,
                    explanation = excluded.explanation
            ",
        )
        .bind(question_id_to_i64(question.id)?)
        .bind(question.area.as_deref())
        .bind(question.disciplina.as_deref())
        .bind(question.statement.as_str())
        .bind(options)
        .bind(usize_i64("correct_option", question.correct_option)?)
        .bind(question.explanation.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn list_questions(
        &self,
        filter: &QuestionFilter,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, area, disciplina, statement, options, correct_option, explanation
                FROM questions
                WHERE (?1 IS NULL OR area = ?1)
                  AND (?2 IS NULL OR disciplina = ?2)
                ORDER BY id ASC
                LIMIT ?3
            ",
        )
        .bind(filter.area.as_deref())
        .bind(filter.disciplina.as_deref())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_question_row(&row)?);
        }
        Ok(out)
    }
}
