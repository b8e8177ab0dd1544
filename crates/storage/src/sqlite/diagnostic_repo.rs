use async_trait::async_trait;
use course_core::model::UserId;

use super::{
    SqliteRepository, connection_error,
    mapping::{diagnostic_json, map_diagnostic_row},
};
use crate::repository::{DiagnosticRecord, DiagnosticRepository, StorageError};

#[async_trait]
impl DiagnosticRepository for SqliteRepository {
    async fn load_diagnostic(
        &self,
        user_id: UserId,
    ) -> Result<Option<DiagnosticRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, responses, next_steps, score, updated_at
            FROM diagnostic_responses
            WHERE user_id = ?1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(connection_error)?;

        row.as_ref().map(map_diagnostic_row).transpose()
    }

    async fn upsert_diagnostic(&self, record: &DiagnosticRecord) -> Result<(), StorageError> {
        let (responses, next_steps) = diagnostic_json(&record.diagnostic)?;
        sqlx::query(
            r"
            INSERT INTO diagnostic_responses (user_id, responses, next_steps, score, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                responses = excluded.responses,
                next_steps = excluded.next_steps,
                score = excluded.score,
                updated_at = excluded.updated_at
            ",
        )
        .bind(record.user_id.to_string())
        .bind(responses)
        .bind(next_steps)
        .bind(i64::from(record.score))
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(connection_error)?;

        Ok(())
    }
}
