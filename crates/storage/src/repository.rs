use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{CardId, ChecklistRowId, Diagnostic, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted completion of one card for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub card_id: CardId,
    pub completed: bool,
    /// Set when `completed` is true, cleared otherwise.
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// Builds the row for a toggle, stamping `completed_at` only when completing.
    #[must_use]
    pub fn toggled(user_id: UserId, card_id: CardId, completed: bool, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            card_id,
            completed,
            completed_at: completed.then_some(now),
        }
    }
}

/// Persisted completion of one checklist item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistRecord {
    pub user_id: UserId,
    pub card_id: CardId,
    pub item_index: u32,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    pub user_id: UserId,
    pub card_id: CardId,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    pub user_id: UserId,
    pub diagnostic: Diagnostic,
    pub score: u32,
    pub updated_at: DateTime<Utc>,
}

impl DiagnosticRecord {
    #[must_use]
    pub fn new(user_id: UserId, diagnostic: Diagnostic, updated_at: DateTime<Utc>) -> Self {
        let score = diagnostic.score();
        Self {
            user_id,
            diagnostic,
            score,
            updated_at,
        }
    }
}

/// Card completion rows, keyed by (user, card).
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch every progress row of a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on transport or decoding failures.
    async fn load_progress(&self, user_id: UserId) -> Result<Vec<ProgressRecord>, StorageError>;

    /// Insert or overwrite the row for (user, card).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError>;
}

/// Checklist rows, one per (user, card, item index).
///
/// There is no upsert on the triple: callers look the row up first and then
/// either update it by id or insert a new one.
#[async_trait]
pub trait ChecklistRepository: Send + Sync {
    /// Fetch checklist rows of a user, optionally scoped to one card.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on transport or decoding failures.
    async fn load_checklist(
        &self,
        user_id: UserId,
        card_id: Option<&CardId>,
    ) -> Result<Vec<ChecklistRecord>, StorageError>;

    /// Row id for (user, card, index), if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on transport failures.
    async fn find_checklist_row(
        &self,
        user_id: UserId,
        card_id: &CardId,
        item_index: u32,
    ) -> Result<Option<ChecklistRowId>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the triple already exists, or other
    /// storage errors.
    async fn insert_checklist(&self, record: &ChecklistRecord)
    -> Result<ChecklistRowId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row is gone, or other storage errors.
    async fn update_checklist(
        &self,
        row_id: ChecklistRowId,
        completed: bool,
    ) -> Result<(), StorageError>;
}

/// Free-text notes, keyed by (user, card).
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on transport or decoding failures.
    async fn load_note(
        &self,
        user_id: UserId,
        card_id: &CardId,
    ) -> Result<Option<NoteRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the note cannot be stored.
    async fn upsert_note(&self, record: &NoteRecord) -> Result<(), StorageError>;
}

/// Self-diagnostic answers, one row per user.
#[async_trait]
pub trait DiagnosticRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on transport or decoding failures.
    async fn load_diagnostic(
        &self,
        user_id: UserId,
    ) -> Result<Option<DiagnosticRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_diagnostic(&self, record: &DiagnosticRecord) -> Result<(), StorageError>;
}

type ChecklistKey = (UserId, CardId, u32);

#[derive(Default)]
struct ChecklistTable {
    next_id: i64,
    rows: HashMap<ChecklistRowId, ChecklistRecord>,
    by_key: HashMap<ChecklistKey, ChecklistRowId>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<(UserId, CardId), ProgressRecord>>>,
    checklist: Arc<Mutex<ChecklistTable>>,
    notes: Arc<Mutex<HashMap<(UserId, CardId), NoteRecord>>>,
    diagnostics: Arc<Mutex<HashMap<UserId, DiagnosticRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load_progress(&self, user_id: UserId) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        guard.insert((record.user_id, record.card_id.clone()), record.clone());
        Ok(())
    }
}

#[async_trait]
impl ChecklistRepository for InMemoryRepository {
    async fn load_checklist(
        &self,
        user_id: UserId,
        card_id: Option<&CardId>,
    ) -> Result<Vec<ChecklistRecord>, StorageError> {
        let guard = self.checklist.lock().map_err(poisoned)?;
        Ok(guard
            .rows
            .values()
            .filter(|r| r.user_id == user_id && card_id.is_none_or(|c| *c == r.card_id))
            .cloned()
            .collect())
    }

    async fn find_checklist_row(
        &self,
        user_id: UserId,
        card_id: &CardId,
        item_index: u32,
    ) -> Result<Option<ChecklistRowId>, StorageError> {
        let guard = self.checklist.lock().map_err(poisoned)?;
        Ok(guard
            .by_key
            .get(&(user_id, card_id.clone(), item_index))
            .copied())
    }

    async fn insert_checklist(
        &self,
        record: &ChecklistRecord,
    ) -> Result<ChecklistRowId, StorageError> {
        let mut guard = self.checklist.lock().map_err(poisoned)?;
        let key = (record.user_id, record.card_id.clone(), record.item_index);
        if guard.by_key.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        guard.next_id += 1;
        let id = ChecklistRowId::new(guard.next_id);
        guard.rows.insert(id, record.clone());
        guard.by_key.insert(key, id);
        Ok(id)
    }

    async fn update_checklist(
        &self,
        row_id: ChecklistRowId,
        completed: bool,
    ) -> Result<(), StorageError> {
        let mut guard = self.checklist.lock().map_err(poisoned)?;
        let row = guard.rows.get_mut(&row_id).ok_or(StorageError::NotFound)?;
        row.completed = completed;
        Ok(())
    }
}

#[async_trait]
impl NoteRepository for InMemoryRepository {
    async fn load_note(
        &self,
        user_id: UserId,
        card_id: &CardId,
    ) -> Result<Option<NoteRecord>, StorageError> {
        let guard = self.notes.lock().map_err(poisoned)?;
        Ok(guard.get(&(user_id, card_id.clone())).cloned())
    }

    async fn upsert_note(&self, record: &NoteRecord) -> Result<(), StorageError> {
        let mut guard = self.notes.lock().map_err(poisoned)?;
        guard.insert((record.user_id, record.card_id.clone()), record.clone());
        Ok(())
    }
}

#[async_trait]
impl DiagnosticRepository for InMemoryRepository {
    async fn load_diagnostic(
        &self,
        user_id: UserId,
    ) -> Result<Option<DiagnosticRecord>, StorageError> {
        let guard = self.diagnostics.lock().map_err(poisoned)?;
        Ok(guard.get(&user_id).cloned())
    }

    async fn upsert_diagnostic(&self, record: &DiagnosticRecord) -> Result<(), StorageError> {
        let mut guard = self.diagnostics.lock().map_err(poisoned)?;
        guard.insert(record.user_id, record.clone());
        Ok(())
    }
}

/// Aggregates the persistence port behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub checklist: Arc<dyn ChecklistRepository>,
    pub notes: Arc<dyn NoteRepository>,
    pub diagnostics: Arc<dyn DiagnosticRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Shares one backend value across every port.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: ProgressRepository
            + ChecklistRepository
            + NoteRepository
            + DiagnosticRepository
            + Clone
            + 'static,
    {
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let checklist: Arc<dyn ChecklistRepository> = Arc::new(repo.clone());
        let notes: Arc<dyn NoteRepository> = Arc::new(repo.clone());
        let diagnostics: Arc<dyn DiagnosticRepository> = Arc::new(repo);
        Self {
            progress,
            checklist,
            notes,
            diagnostics,
        }
    }
}
