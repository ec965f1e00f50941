use edu_core::model::{
    AreaTally, Attempt, AttemptId, Question, QuestionId, QuizType, SlotKey, UserId,
};
use sqlx::Row;
use uuid::Uuid;

use crate::repository::{Profile, StorageError, StoredAttempt};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn usize_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn usize_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn question_id_to_i64(id: QuestionId) -> Result<i64, StorageError> {
    id_i64("question_id", id.value())
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    u64::try_from(v)
        .map(UserId::new)
        .map_err(|_| StorageError::Serialization("user_id sign overflow".into()))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    u64::try_from(v)
        .map(QuestionId::new)
        .map_err(|_| StorageError::Serialization("question_id sign overflow".into()))
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<StoredAttempt, StorageError> {
    let remote_id: i64 = row.try_get("id").map_err(ser)?;
    let local_id: String = row.try_get("local_id").map_err(ser)?;
    let local_id = Uuid::parse_str(&local_id).map_err(ser)?;
    let quiz_type: QuizType = row
        .try_get::<String, _>("quiz_type")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let area: Option<String> = row.try_get("area").map_err(ser)?;
    let disciplina: Option<String> = row.try_get("disciplina").map_err(ser)?;

    let attempt = Attempt::new(
        AttemptId::from_uuid(local_id),
        SlotKey::new(quiz_type, area.as_deref(), disciplina.as_deref()),
        row.try_get("completed_at").map_err(ser)?,
        u32_from_i64("total_questions", row.try_get("total_questions").map_err(ser)?)?,
        u32_from_i64("correct_count", row.try_get("correct_count").map_err(ser)?)?,
        u32_from_i64("incorrect_count", row.try_get("incorrect_count").map_err(ser)?)?,
    )
    .map_err(ser)?;

    Ok(StoredAttempt { remote_id, attempt })
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let options: String = row.try_get("options").map_err(ser)?;
    let options: Vec<String> = serde_json::from_str(&options).map_err(ser)?;
    let area: Option<String> = row.try_get("area").map_err(ser)?;
    let disciplina: Option<String> = row.try_get("disciplina").map_err(ser)?;
    let statement: String = row.try_get("statement").map_err(ser)?;
    let explanation: String = row.try_get("explanation").map_err(ser)?;

    Question::new(
        question_id_from_i64(row.try_get("id").map_err(ser)?)?,
        area.as_deref(),
        disciplina.as_deref(),
        statement,
        options,
        usize_from_i64("correct_option", row.try_get("correct_option").map_err(ser)?)?,
        explanation,
    )
    .map_err(ser)
}

pub(crate) fn map_tally_row(row: &sqlx::sqlite::SqliteRow) -> Result<AreaTally, StorageError> {
    Ok(AreaTally {
        area: row.try_get("area").map_err(ser)?,
        correct: u32_from_i64("correct", row.try_get("correct").map_err(ser)?)?,
        attempted: u32_from_i64("attempted", row.try_get("attempted").map_err(ser)?)?,
    })
}

pub(crate) fn map_profile_row(row: &sqlx::sqlite::SqliteRow) -> Result<Profile, StorageError> {
    Ok(Profile {
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        display_name: row.try_get("display_name").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn credits_from_i64(v: i64) -> Result<u32, StorageError> {
    u32_from_i64("remaining", v)
}
