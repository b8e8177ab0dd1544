use async_trait::async_trait;
use course_core::model::UserId;

use super::{SqliteRepository, connection_error, mapping::map_progress_row};
use crate::repository::{ProgressRecord, ProgressRepository, StorageError};

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load_progress(&self, user_id: UserId) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, card_id, completed, completed_at
            FROM user_progress
            WHERE user_id = ?1
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(connection_error)?;

        rows.iter().map(map_progress_row).collect()
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_progress (user_id, card_id, completed, completed_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, card_id) DO UPDATE SET
                completed = excluded.completed,
                completed_at = excluded.completed_at
            ",
        )
        .bind(record.user_id.to_string())
        .bind(record.card_id.as_str())
        .bind(i64::from(record.completed))
        .bind(record.completed_at)
        .execute(&self.pool)
        .await
        .map_err(connection_error)?;

        Ok(())
    }
}
