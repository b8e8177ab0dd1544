//! PostgREST-style remote backend.
//!
//! Tables are addressed as `{base}/rest/v1/{table}` with `eq.` filters.
//! Upserts post with `on_conflict` and `Prefer: resolution=merge-duplicates`.

use std::collections::BTreeMap;
use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{CardId, ChecklistRowId, Diagnostic, Level, UserId};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::{
    ChecklistRecord, ChecklistRepository, DiagnosticRecord, DiagnosticRepository, NoteRecord,
    NoteRepository, ProgressRecord, ProgressRepository, Storage, StorageError,
};

const PROGRESS_TABLE: &str = "user_progress";
const CHECKLIST_TABLE: &str = "user_checklist_progress";
const NOTES_TABLE: &str = "user_card_notes";
const DIAGNOSTIC_TABLE: &str = "diagnostic_responses";

#[derive(Clone, Debug)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: String,
    /// Bearer token of the signed-in user; the api key is used when absent.
    pub access_token: Option<String>,
}

impl RestConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("COURSE_REST_URL").ok()?;
        let api_key = env::var("COURSE_REST_KEY").ok()?;
        if base_url.trim().is_empty() || api_key.trim().is_empty() {
            return None;
        }
        let access_token = env::var("COURSE_REST_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        Some(Self {
            base_url,
            api_key,
            access_token,
        })
    }
}

#[derive(Clone)]
pub struct RestRepository {
    client: Client,
    config: RestConfig,
}

impl RestRepository {
    #[must_use]
    pub fn new(config: RestConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/rest/v1/{table}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let token = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.config.api_key)
            .bearer_auth(token)
    }

    fn upsert(&self, table: &str, conflict: &str) -> RequestBuilder {
        self.request(Method::POST, table)
            .query(&[("on_conflict", conflict)])
            .header("Prefer", "resolution=merge-duplicates")
    }
}

impl Storage {
    #[must_use]
    pub fn rest(config: RestConfig) -> Self {
        Self::from_repository(RestRepository::new(config))
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

fn transport(e: reqwest::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn status_error(status: StatusCode) -> StorageError {
    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound,
        StatusCode::CONFLICT => StorageError::Conflict,
        other => StorageError::Connection(format!("remote store answered {other}")),
    }
}

async fn send(builder: RequestBuilder) -> Result<Response, StorageError> {
    let response = builder.send().await.map_err(transport)?;
    if !response.status().is_success() {
        return Err(status_error(response.status()));
    }
    Ok(response)
}

async fn fetch<T: DeserializeOwned>(builder: RequestBuilder) -> Result<Vec<T>, StorageError> {
    send(builder)
        .await?
        .json::<Vec<T>>()
        .await
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

//
// ─── WIRE ROWS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize, Deserialize)]
struct ProgressRow {
    user_id: Uuid,
    card_id: String,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

impl From<ProgressRow> for ProgressRecord {
    fn from(row: ProgressRow) -> Self {
        Self {
            user_id: UserId::new(row.user_id),
            card_id: CardId::new(row.card_id),
            completed: row.completed.unwrap_or(false),
            completed_at: row.completed_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChecklistRow {
    user_id: Uuid,
    card_id: String,
    item_index: u32,
    completed: bool,
}

#[derive(Debug, Deserialize)]
struct RowId {
    id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct NoteRow {
    user_id: Uuid,
    card_id: String,
    #[serde(default)]
    content: Option<String>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DiagnosticRow {
    user_id: Uuid,
    #[serde(default)]
    responses: Option<BTreeMap<String, Level>>,
    #[serde(default)]
    next_steps: Option<Vec<String>>,
    score: u32,
    updated_at: DateTime<Utc>,
}

//
// ─── PORTS ─────────────────────────────────────────────────────────────────────
//

#[async_trait]
impl ProgressRepository for RestRepository {
    async fn load_progress(&self, user_id: UserId) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows: Vec<ProgressRow> = fetch(
            self.request(Method::GET, PROGRESS_TABLE).query(&[
                ("select", "user_id,card_id,completed,completed_at".to_string()),
                ("user_id", eq(user_id)),
            ]),
        )
        .await?;
        Ok(rows.into_iter().map(ProgressRecord::from).collect())
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let row = ProgressRow {
            user_id: record.user_id.value(),
            card_id: record.card_id.to_string(),
            completed: Some(record.completed),
            completed_at: record.completed_at,
        };
        send(self.upsert(PROGRESS_TABLE, "user_id,card_id").json(&row)).await?;
        Ok(())
    }
}

#[async_trait]
impl ChecklistRepository for RestRepository {
    async fn load_checklist(
        &self,
        user_id: UserId,
        card_id: Option<&CardId>,
    ) -> Result<Vec<ChecklistRecord>, StorageError> {
        let mut query = vec![
            ("select", "user_id,card_id,item_index,completed".to_string()),
            ("user_id", eq(user_id)),
        ];
        if let Some(card) = card_id {
            query.push(("card_id", eq(card)));
        }
        let rows: Vec<ChecklistRow> =
            fetch(self.request(Method::GET, CHECKLIST_TABLE).query(&query)).await?;
        Ok(rows
            .into_iter()
            .map(|row| ChecklistRecord {
                user_id: UserId::new(row.user_id),
                card_id: CardId::new(row.card_id),
                item_index: row.item_index,
                completed: row.completed,
            })
            .collect())
    }

    async fn find_checklist_row(
        &self,
        user_id: UserId,
        card_id: &CardId,
        item_index: u32,
    ) -> Result<Option<ChecklistRowId>, StorageError> {
        let rows: Vec<RowId> = fetch(self.request(Method::GET, CHECKLIST_TABLE).query(&[
            ("select", "id".to_string()),
            ("user_id", eq(user_id)),
            ("card_id", eq(card_id)),
            ("item_index", eq(item_index)),
        ]))
        .await?;
        Ok(rows.first().map(|r| ChecklistRowId::new(r.id)))
    }

    async fn insert_checklist(
        &self,
        record: &ChecklistRecord,
    ) -> Result<ChecklistRowId, StorageError> {
        let row = ChecklistRow {
            user_id: record.user_id.value(),
            card_id: record.card_id.to_string(),
            item_index: record.item_index,
            completed: record.completed,
        };
        let created: Vec<RowId> = fetch(
            self.request(Method::POST, CHECKLIST_TABLE)
                .query(&[("select", "id")])
                .header("Prefer", "return=representation")
                .json(&row),
        )
        .await?;
        created
            .first()
            .map(|r| ChecklistRowId::new(r.id))
            .ok_or_else(|| StorageError::Serialization("insert returned no row".into()))
    }

    async fn update_checklist(
        &self,
        row_id: ChecklistRowId,
        completed: bool,
    ) -> Result<(), StorageError> {
        let updated: Vec<RowId> = fetch(
            self.request(Method::PATCH, CHECKLIST_TABLE)
                .query(&[("id", eq(row_id)), ("select", "id".to_string())])
                .header("Prefer", "return=representation")
                .json(&serde_json::json!({ "completed": completed })),
        )
        .await?;
        if updated.is_empty() {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl NoteRepository for RestRepository {
    async fn load_note(
        &self,
        user_id: UserId,
        card_id: &CardId,
    ) -> Result<Option<NoteRecord>, StorageError> {
        let rows: Vec<NoteRow> = fetch(self.request(Method::GET, NOTES_TABLE).query(&[
            ("select", "user_id,card_id,content,updated_at".to_string()),
            ("user_id", eq(user_id)),
            ("card_id", eq(card_id)),
        ]))
        .await?;
        Ok(rows.into_iter().next().map(|row| NoteRecord {
            user_id: UserId::new(row.user_id),
            card_id: CardId::new(row.card_id),
            content: row.content.unwrap_or_default(),
            updated_at: row.updated_at,
        }))
    }

    async fn upsert_note(&self, record: &NoteRecord) -> Result<(), StorageError> {
        let row = NoteRow {
            user_id: record.user_id.value(),
            card_id: record.card_id.to_string(),
            content: Some(record.content.clone()),
            updated_at: record.updated_at,
        };
        send(self.upsert(NOTES_TABLE, "user_id,card_id").json(&row)).await?;
        Ok(())
    }
}

#[async_trait]
impl DiagnosticRepository for RestRepository {
    async fn load_diagnostic(
        &self,
        user_id: UserId,
    ) -> Result<Option<DiagnosticRecord>, StorageError> {
        let rows: Vec<DiagnosticRow> = fetch(self.request(Method::GET, DIAGNOSTIC_TABLE).query(&[
            ("select", "user_id,responses,next_steps,score,updated_at".to_string()),
            ("user_id", eq(user_id)),
        ]))
        .await?;
        Ok(rows.into_iter().next().map(|row| DiagnosticRecord {
            user_id: UserId::new(row.user_id),
            diagnostic: Diagnostic::from_persisted(
                row.responses.unwrap_or_default(),
                row.next_steps.unwrap_or_default(),
            ),
            score: row.score,
            updated_at: row.updated_at,
        }))
    }

    async fn upsert_diagnostic(&self, record: &DiagnosticRecord) -> Result<(), StorageError> {
        let row = DiagnosticRow {
            user_id: record.user_id.value(),
            responses: Some(record.diagnostic.responses().clone()),
            next_steps: Some(record.diagnostic.next_steps().to_vec()),
            score: record.score,
            updated_at: record.updated_at,
        };
        send(self.upsert(DIAGNOSTIC_TABLE, "user_id").json(&row)).await?;
        Ok(())
    }
}
