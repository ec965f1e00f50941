use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS attempts (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            local_id TEXT NOT NULL,
            quiz_type TEXT NOT NULL,
            area TEXT,
            disciplina TEXT,
            completed_at TEXT NOT NULL,
            total_questions INTEGER NOT NULL CHECK (total_questions > 0),
            correct_count INTEGER NOT NULL CHECK (correct_count >= 0),
            incorrect_count INTEGER NOT NULL CHECK (incorrect_count >= 0),
            percentage INTEGER NOT NULL CHECK (percentage BETWEEN 0 AND 100)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS attempt_answers (
            id INTEGER PRIMARY KEY,
            attempt_id INTEGER NOT NULL,
            question_id INTEGER NOT NULL,
            area TEXT,
            selected_option INTEGER,
            is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1)),
            FOREIGN KEY (attempt_id) REFERENCES attempts(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY,
            area TEXT,
            disciplina TEXT,
            statement TEXT NOT NULL,
            options TEXT NOT NULL,
            correct_option INTEGER NOT NULL CHECK (correct_option >= 0),
            explanation TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS profiles (
            user_id INTEGER PRIMARY KEY,
            display_name TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS chat_credits (
            user_id INTEGER PRIMARY KEY,
            remaining INTEGER NOT NULL CHECK (remaining >= 0),
            updated_at TEXT NOT NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_attempts_user_slot
            ON attempts (user_id, quiz_type, area, disciplina);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_attempt_answers_attempt
            ON attempt_answers (attempt_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_questions_area_disciplina
            ON questions (area, disciplina, id);
    ",
];

/// Runs the versioned migrations for the current schema.
///
/// Version 1 creates attempts, answers, the question bank, profiles and chat credits.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        log::info!("applied schema migration 1");
    }

    Ok(())
}
