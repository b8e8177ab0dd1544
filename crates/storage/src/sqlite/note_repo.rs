use async_trait::async_trait;
use course_core::model::{CardId, UserId};

use super::{SqliteRepository, connection_error, mapping::map_note_row};
use crate::repository::{NoteRecord, NoteRepository, StorageError};

#[async_trait]
impl NoteRepository for SqliteRepository {
    async fn load_note(
        &self,
        user_id: UserId,
        card_id: &CardId,
    ) -> Result<Option<NoteRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, card_id, content, updated_at
            FROM user_card_notes
            WHERE user_id = ?1 AND card_id = ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(card_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(connection_error)?;

        row.as_ref().map(map_note_row).transpose()
    }

    async fn upsert_note(&self, record: &NoteRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_card_notes (user_id, card_id, content, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, card_id) DO UPDATE SET
                content = excluded.content,
                updated_at = excluded.updated_at
            ",
        )
        .bind(record.user_id.to_string())
        .bind(record.card_id.as_str())
        .bind(record.content.as_str())
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(connection_error)?;

        Ok(())
    }
}
