use async_trait::async_trait;
use course_core::model::{CardId, ChecklistRowId, UserId};
use sqlx::Row;

use super::{SqliteRepository, connection_error, mapping::map_checklist_row};
use crate::repository::{ChecklistRecord, ChecklistRepository, StorageError};

#[async_trait]
impl ChecklistRepository for SqliteRepository {
    async fn load_checklist(
        &self,
        user_id: UserId,
        card_id: Option<&CardId>,
    ) -> Result<Vec<ChecklistRecord>, StorageError> {
        let rows = match card_id {
            Some(card) => {
                sqlx::query(
                    r"
                    SELECT user_id, card_id, item_index, completed
                    FROM user_checklist_progress
                    WHERE user_id = ?1 AND card_id = ?2
                    ORDER BY item_index ASC
                    ",
                )
                .bind(user_id.to_string())
                .bind(card.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r"
                    SELECT user_id, card_id, item_index, completed
                    FROM user_checklist_progress
                    WHERE user_id = ?1
                    ORDER BY card_id ASC, item_index ASC
                    ",
                )
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(connection_error)?;

        rows.iter().map(map_checklist_row).collect()
    }

    async fn find_checklist_row(
        &self,
        user_id: UserId,
        card_id: &CardId,
        item_index: u32,
    ) -> Result<Option<ChecklistRowId>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id
            FROM user_checklist_progress
            WHERE user_id = ?1 AND card_id = ?2 AND item_index = ?3
            ",
        )
        .bind(user_id.to_string())
        .bind(card_id.as_str())
        .bind(i64::from(item_index))
        .fetch_optional(&self.pool)
        .await
        .map_err(connection_error)?;

        row.map(|r| {
            r.try_get::<i64, _>("id")
                .map(ChecklistRowId::new)
                .map_err(|e| StorageError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn insert_checklist(
        &self,
        record: &ChecklistRecord,
    ) -> Result<ChecklistRowId, StorageError> {
        let result = sqlx::query(
            r"
            INSERT INTO user_checklist_progress (user_id, card_id, item_index, completed)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(record.user_id.to_string())
        .bind(record.card_id.as_str())
        .bind(i64::from(record.item_index))
        .bind(i64::from(record.completed))
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StorageError::Conflict,
            _ => connection_error(e),
        })?;

        Ok(ChecklistRowId::new(result.last_insert_rowid()))
    }

    async fn update_checklist(
        &self,
        row_id: ChecklistRowId,
        completed: bool,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            UPDATE user_checklist_progress
            SET completed = ?1
            WHERE id = ?2
            ",
        )
        .bind(i64::from(completed))
        .bind(row_id.value())
        .execute(&self.pool)
        .await
        .map_err(connection_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
