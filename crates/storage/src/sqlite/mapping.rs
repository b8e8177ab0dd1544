use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use course_core::model::{CardId, Diagnostic, Level, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{
    ChecklistRecord, DiagnosticRecord, NoteRecord, ProgressRecord, StorageError,
};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn user_id_from_row(row: &SqliteRow) -> Result<UserId, StorageError> {
    let raw: String = row.try_get("user_id").map_err(ser)?;
    raw.parse::<UserId>().map_err(ser)
}

fn card_id_from_row(row: &SqliteRow) -> Result<CardId, StorageError> {
    let raw: String = row.try_get("card_id").map_err(ser)?;
    Ok(CardId::new(raw))
}

fn bool_from_row(row: &SqliteRow, field: &'static str) -> Result<bool, StorageError> {
    let raw: i64 = row.try_get(field).map_err(ser)?;
    match raw {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StorageError::Serialization(format!(
            "invalid {field}: {other}"
        ))),
    }
}

pub(crate) fn item_index_from_i64(v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid item_index: {v}")))
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    Ok(ProgressRecord {
        user_id: user_id_from_row(row)?,
        card_id: card_id_from_row(row)?,
        completed: bool_from_row(row, "completed")?,
        completed_at: row
            .try_get::<Option<DateTime<Utc>>, _>("completed_at")
            .map_err(ser)?,
    })
}

pub(crate) fn map_checklist_row(row: &SqliteRow) -> Result<ChecklistRecord, StorageError> {
    Ok(ChecklistRecord {
        user_id: user_id_from_row(row)?,
        card_id: card_id_from_row(row)?,
        item_index: item_index_from_i64(row.try_get("item_index").map_err(ser)?)?,
        completed: bool_from_row(row, "completed")?,
    })
}

pub(crate) fn map_note_row(row: &SqliteRow) -> Result<NoteRecord, StorageError> {
    Ok(NoteRecord {
        user_id: user_id_from_row(row)?,
        card_id: card_id_from_row(row)?,
        content: row.try_get("content").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_diagnostic_row(row: &SqliteRow) -> Result<DiagnosticRecord, StorageError> {
    let responses_raw: String = row.try_get("responses").map_err(ser)?;
    let steps_raw: String = row.try_get("next_steps").map_err(ser)?;
    let responses: BTreeMap<String, Level> = serde_json::from_str(&responses_raw).map_err(ser)?;
    let next_steps: Vec<String> = serde_json::from_str(&steps_raw).map_err(ser)?;
    let score: i64 = row.try_get("score").map_err(ser)?;

    Ok(DiagnosticRecord {
        user_id: user_id_from_row(row)?,
        diagnostic: Diagnostic::from_persisted(responses, next_steps),
        score: u32::try_from(score)
            .map_err(|_| StorageError::Serialization(format!("invalid score: {score}")))?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn diagnostic_json(diagnostic: &Diagnostic) -> Result<(String, String), StorageError> {
    let responses = serde_json::to_string(diagnostic.responses()).map_err(ser)?;
    let steps = serde_json::to_string(diagnostic.next_steps()).map_err(ser)?;
    Ok((responses, steps))
}
