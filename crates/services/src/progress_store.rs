use std::sync::Arc;

use course_core::model::{CardId, CompletionLookup, ProgressMap, UserId};
use course_core::optimistic::{OptimisticWrite, WriteOutcome};
use storage::repository::{ProgressRecord, ProgressRepository, StorageError};

use crate::Clock;

/// Key of one card-completion write.
pub type ProgressKey = (UserId, CardId);

/// Per-user card completion with optimistic toggles.
pub struct ProgressStore {
    clock: Clock,
    user_id: Option<UserId>,
    progress: ProgressMap,
    repo: Arc<dyn ProgressRepository>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn ProgressRepository>) -> Self {
        Self {
            clock,
            user_id: None,
            progress: ProgressMap::new(),
            repo,
        }
    }

    /// Binds the store to `user_id` and replaces its state with the stored
    /// rows. A failed read leaves the store empty.
    pub async fn load_all(&mut self, user_id: UserId) -> &ProgressMap {
        self.user_id = Some(user_id);
        self.progress.clear();
        match self.repo.load_progress(user_id).await {
            Ok(rows) => {
                self.progress = rows
                    .into_iter()
                    .map(|row| (row.card_id, row.completed))
                    .collect();
            }
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "failed to load card progress");
            }
        }
        &self.progress
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressMap {
        &self.progress
    }

    #[must_use]
    pub fn completion_percentage<'a, I>(&self, card_ids: I) -> u8
    where
        I: IntoIterator<Item = &'a CardId>,
    {
        self.progress.completion_percentage(card_ids)
    }

    /// Flips `card_id` in memory and returns the write to persist.
    ///
    /// Returns `None` without a signed-in user.
    pub fn begin_toggle(&mut self, card_id: &CardId) -> Option<OptimisticWrite<ProgressKey>> {
        let Some(user_id) = self.user_id else {
            tracing::debug!(card = %card_id, "progress toggle ignored without a user");
            return None;
        };
        let write = OptimisticWrite::flip((user_id, card_id.clone()), self.progress.get(card_id));
        self.progress.set(card_id.clone(), write.next());
        Some(write)
    }

    /// Upserts the new value of `write`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the repository rejects the upsert.
    pub async fn persist(&self, write: &OptimisticWrite<ProgressKey>) -> Result<(), StorageError> {
        let (user_id, card_id) = write.key();
        let record = ProgressRecord::toggled(*user_id, card_id.clone(), write.next(), self.clock.now());
        self.repo.upsert_progress(&record).await
    }

    /// Applies the persistence result of `write`, restoring the value it
    /// replaced on failure.
    pub fn settle(
        &mut self,
        write: OptimisticWrite<ProgressKey>,
        result: Result<(), StorageError>,
    ) -> WriteOutcome {
        let Some(previous) = write.rollback_value(&result) else {
            return WriteOutcome::Persisted {
                completed: write.next(),
            };
        };
        let (user_id, card_id) = write.into_key();
        if let Err(err) = &result {
            tracing::error!(
                %user_id,
                card = %card_id,
                error = %err,
                "card progress write failed, reverting"
            );
        }
        if self.user_id == Some(user_id) {
            self.progress.set(card_id, previous);
        }
        WriteOutcome::Reverted {
            completed: previous,
        }
    }

    /// Flips the completion of `card_id` and persists it.
    pub async fn toggle(&mut self, card_id: &CardId) -> WriteOutcome {
        let Some(write) = self.begin_toggle(card_id) else {
            return WriteOutcome::Ignored;
        };
        let result = self.persist(&write).await;
        self.settle(write, result)
    }

    /// Drops all state and the bound user.
    pub fn reset(&mut self) {
        self.user_id = None;
        self.progress.clear();
    }
}

impl CompletionLookup for ProgressStore {
    fn is_completed(&self, card_id: &CardId) -> bool {
        self.progress.get(card_id)
    }
}
