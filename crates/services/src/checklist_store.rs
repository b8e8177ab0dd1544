use std::collections::HashMap;
use std::sync::Arc;

use course_core::model::{CardId, ChecklistMap, ChecklistStats, UserId};
use course_core::optimistic::{OptimisticWrite, WriteOutcome};
use storage::repository::{ChecklistRecord, ChecklistRepository, StorageError};

/// Key of one checklist-item write.
pub type ChecklistKey = (UserId, CardId, usize);

/// Per-user checklist item completion with optimistic toggles.
pub struct ChecklistStore {
    user_id: Option<UserId>,
    items: ChecklistMap,
    repo: Arc<dyn ChecklistRepository>,
}

impl ChecklistStore {
    #[must_use]
    pub fn new(repo: Arc<dyn ChecklistRepository>) -> Self {
        Self {
            user_id: None,
            items: ChecklistMap::new(),
            repo,
        }
    }

    /// Loads stored checklist rows for `user_id`.
    ///
    /// With `card_id` only that card's items are replaced; otherwise the
    /// whole state is. A failed read keeps the current state.
    pub async fn load_all(&mut self, user_id: UserId, card_id: Option<&CardId>) {
        if self.user_id != Some(user_id) {
            self.items.clear();
        }
        self.user_id = Some(user_id);

        let rows = match self.repo.load_checklist(user_id, card_id).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "failed to load checklist progress");
                return;
            }
        };

        let mut by_card: HashMap<CardId, HashMap<usize, bool>> = HashMap::new();
        if let Some(card_id) = card_id {
            by_card.insert(card_id.clone(), HashMap::new());
        } else {
            self.items.clear();
        }
        for row in rows {
            by_card
                .entry(row.card_id)
                .or_default()
                .insert(row.item_index as usize, row.completed);
        }
        for (card_id, items) in by_card {
            self.items.replace_card(card_id, items);
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    #[must_use]
    pub fn is_item_completed(&self, card_id: &CardId, index: usize) -> bool {
        self.items.get(card_id, index)
    }

    /// Completion of the first `total_items` items of `card_id`.
    #[must_use]
    pub fn card_progress(&self, card_id: &CardId, total_items: usize) -> ChecklistStats {
        self.items.stats(card_id, total_items)
    }

    /// Completion of the `len` items starting at `offset`.
    #[must_use]
    pub fn section_progress(&self, card_id: &CardId, offset: usize, len: usize) -> ChecklistStats {
        ChecklistStats::new(self.items.completed_in(card_id, offset..offset.saturating_add(len)), len)
    }

    /// Flips one item in memory and returns the write to persist.
    ///
    /// Returns `None` without a signed-in user.
    pub fn begin_toggle(
        &mut self,
        card_id: &CardId,
        index: usize,
    ) -> Option<OptimisticWrite<ChecklistKey>> {
        let Some(user_id) = self.user_id else {
            tracing::debug!(card = %card_id, index, "checklist toggle ignored without a user");
            return None;
        };
        let write = OptimisticWrite::flip(
            (user_id, card_id.clone(), index),
            self.items.get(card_id, index),
        );
        self.items.set(card_id.clone(), index, write.next());
        Some(write)
    }

    /// Writes the new value of `write`: updates the existing row for the
    /// item, or inserts one when none exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup, update or insert fails.
    pub async fn persist(
        &self,
        write: &OptimisticWrite<ChecklistKey>,
    ) -> Result<(), StorageError> {
        let (user_id, card_id, index) = write.key();
        let item_index = u32::try_from(*index)
            .map_err(|_| StorageError::Serialization(format!("item index {index} out of range")))?;

        match self
            .repo
            .find_checklist_row(*user_id, card_id, item_index)
            .await?
        {
            Some(row_id) => self.repo.update_checklist(row_id, write.next()).await,
            None => {
                let record = ChecklistRecord {
                    user_id: *user_id,
                    card_id: card_id.clone(),
                    item_index,
                    completed: write.next(),
                };
                self.repo.insert_checklist(&record).await.map(|_| ())
            }
        }
    }

    /// Applies the persistence result of `write`, restoring the value it
    /// replaced on failure.
    pub fn settle(
        &mut self,
        write: OptimisticWrite<ChecklistKey>,
        result: Result<(), StorageError>,
    ) -> WriteOutcome {
        let Some(previous) = write.rollback_value(&result) else {
            return WriteOutcome::Persisted {
                completed: write.next(),
            };
        };
        if let Err(err) = &result {
            let (_, card_id, index) = write.key();
            tracing::error!(card = %card_id, index, error = %err, "checklist write failed, reverting");
        }
        let (user_id, card_id, index) = write.into_key();
        if self.user_id == Some(user_id) {
            self.items.set(card_id, index, previous);
        }
        WriteOutcome::Reverted {
            completed: previous,
        }
    }

    /// Flips item `index` of `card_id` and persists it.
    pub async fn toggle(&mut self, card_id: &CardId, index: usize) -> WriteOutcome {
        let Some(write) = self.begin_toggle(card_id, index) else {
            return WriteOutcome::Ignored;
        };
        let result = self.persist(&write).await;
        self.settle(write, result)
    }

    /// Drops all state and the bound user.
    pub fn reset(&mut self) {
        self.user_id = None;
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storage::repository::InMemoryRepository;

    fn user() -> UserId {
        UserId::new(uuid::Uuid::from_u128(11))
    }

    async fn signed_in(repo: &InMemoryRepository) -> ChecklistStore {
        let mut store = ChecklistStore::new(Arc::new(repo.clone()));
        store.load_all(user(), None).await;
        store
    }

    #[tokio::test]
    async fn first_toggle_inserts_then_updates_same_row() {
        let repo = InMemoryRepository::new();
        let mut store = signed_in(&repo).await;
        let card = CardId::new("ppg-2");

        assert_eq!(
            store.toggle(&card, 1).await,
            WriteOutcome::Persisted { completed: true }
        );
        assert_eq!(
            store.toggle(&card, 1).await,
            WriteOutcome::Persisted { completed: false }
        );

        let rows = repo.load_checklist(user(), Some(&card)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_index, 1);
        assert!(!rows[0].completed);
    }

    #[tokio::test]
    async fn never_written_items_are_incomplete() {
        let repo = InMemoryRepository::new();
        let store = signed_in(&repo).await;

        assert!(!store.is_item_completed(&CardId::new("ppg-2"), 0));
        assert!(!store.is_item_completed(&CardId::new("unknown"), 42));
    }

    #[tokio::test]
    async fn card_progress_ignores_indices_beyond_total() {
        let repo = InMemoryRepository::new();
        let mut store = signed_in(&repo).await;
        let card = CardId::new("ppg-2");
        for index in [0, 2, 5] {
            let _ = store.toggle(&card, index).await;
        }

        let stats = store.card_progress(&card, 4);
        assert_eq!((stats.completed, stats.total, stats.percentage), (2, 4, 50));
        assert_eq!(store.card_progress(&card, 0).percentage, 0);
    }

    #[tokio::test]
    async fn section_progress_counts_only_its_window() {
        let repo = InMemoryRepository::new();
        let mut store = signed_in(&repo).await;
        let card = CardId::new("ppg-2");
        for index in [0, 3, 4] {
            let _ = store.toggle(&card, index).await;
        }

        let stats = store.section_progress(&card, 3, 3);
        assert_eq!((stats.completed, stats.total, stats.percentage), (2, 3, 67));
    }

    #[tokio::test]
    async fn scoped_load_replaces_only_that_card() {
        let repo = InMemoryRepository::new();
        let mut store = signed_in(&repo).await;
        let kept = CardId::new("ppg-1");
        let reloaded = CardId::new("ppg-2");
        let _ = store.toggle(&kept, 0).await;
        repo.insert_checklist(&ChecklistRecord {
            user_id: user(),
            card_id: reloaded.clone(),
            item_index: 3,
            completed: true,
        })
        .await
        .unwrap();

        store.load_all(user(), Some(&reloaded)).await;

        assert!(store.is_item_completed(&kept, 0));
        assert!(store.is_item_completed(&reloaded, 3));
    }

    #[tokio::test]
    async fn failed_write_restores_previous_value() {
        let repo = InMemoryRepository::new();
        let mut store = signed_in(&repo).await;
        let card = CardId::new("ppg-3");

        let write = store.begin_toggle(&card, 2).unwrap();
        assert!(store.is_item_completed(&card, 2));
        let outcome = store.settle(write, Err(StorageError::Connection("offline".into())));

        assert_eq!(outcome, WriteOutcome::Reverted { completed: false });
        assert!(!store.is_item_completed(&card, 2));
    }
}
