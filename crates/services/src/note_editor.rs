use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use course_core::autosave::{LoadTicket, NoteBuffer, NotePanel, PendingSave};
use course_core::model::{CardId, UserId};
use storage::repository::{NoteRecord, NoteRepository};

use crate::error::NoteError;
use crate::Clock;

/// Result of one save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveAttempt {
    Saved { at: DateTime<Utc> },
    Failed { message: String },
}

/// Drives debounced autosave of the note belonging to the open card.
///
/// Loading is split into `begin_open`, `fetch` and `resolve_load` so a slow
/// load for a card the user already left can be discarded on arrival.
pub struct NoteEditor {
    clock: Clock,
    user_id: Option<UserId>,
    panel: NotePanel,
    repo: Arc<dyn NoteRepository>,
}

impl NoteEditor {
    #[must_use]
    pub fn new(
        clock: Clock,
        user_id: Option<UserId>,
        debounce: Duration,
        repo: Arc<dyn NoteRepository>,
    ) -> Self {
        Self {
            clock,
            user_id,
            panel: NotePanel::new(debounce),
            repo,
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&NoteBuffer> {
        self.panel.current()
    }

    /// Opens `card_id` and loads its note, flushing unsaved text of the
    /// previously open card first. Returns the result of that flush; text
    /// it failed to save is restored when its card is opened again.
    pub async fn open(&mut self, card_id: CardId) -> Option<SaveAttempt> {
        let (ticket, flushed) = self.begin_open(card_id).await;
        let loaded = self.fetch(&ticket).await;
        self.resolve_load(&ticket, loaded);
        flushed
    }

    /// Switches the panel to `card_id` and returns the ticket of the load
    /// to issue along with the flush of the previous card, if one ran.
    pub async fn begin_open(&mut self, card_id: CardId) -> (LoadTicket, Option<SaveAttempt>) {
        let (ticket, flushed) = self.panel.open(card_id);
        let attempt = match flushed {
            Some(pending) if self.user_id.is_some() => Some(self.save(pending).await),
            Some(pending) => {
                self.panel.discard(&pending.card_id);
                None
            }
            None => None,
        };
        (ticket, attempt)
    }

    /// Fetches the stored note for `ticket`. Missing notes and read
    /// failures both yield `None`.
    pub async fn fetch(&self, ticket: &LoadTicket) -> Option<(String, Option<DateTime<Utc>>)> {
        let user_id = self.user_id?;
        match self.repo.load_note(user_id, &ticket.card_id).await {
            Ok(note) => note.map(|note| (note.content, Some(note.updated_at))),
            Err(err) => {
                let err = NoteError::Load(err);
                tracing::warn!(card = %ticket.card_id, error = %err, "failed to load note");
                None
            }
        }
    }

    /// Applies a fetched note if `ticket` still belongs to the open card.
    pub fn resolve_load(
        &mut self,
        ticket: &LoadTicket,
        loaded: Option<(String, Option<DateTime<Utc>>)>,
    ) -> bool {
        let applied = self.panel.resolve_load(ticket, loaded);
        if !applied {
            tracing::debug!(card = %ticket.card_id, "discarding stale note load");
        }
        applied
    }

    /// Replaces the open note's text. Returns `false` when no card is open.
    pub fn edit(&mut self, text: impl Into<String>) -> bool {
        let now = self.clock.now();
        self.edit_at(text, now)
    }

    pub fn edit_at(&mut self, text: impl Into<String>, now: DateTime<Utc>) -> bool {
        match self.panel.current_mut() {
            Some(buffer) => {
                buffer.edit(text, now);
                true
            }
            None => false,
        }
    }

    /// Time left until the open note's debounced save is due; zero once
    /// overdue. `None` while nothing waits to be saved.
    #[must_use]
    pub fn time_until_due(&self) -> Option<std::time::Duration> {
        let deadline = self.panel.current()?.deadline()?;
        Some((deadline - self.clock.now()).to_std().unwrap_or_default())
    }

    /// Saves the open note if its debounce window has elapsed.
    pub async fn tick(&mut self) -> Option<SaveAttempt> {
        let now = self.clock.now();
        self.tick_at(now).await
    }

    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> Option<SaveAttempt> {
        self.user_id?;
        let pending = self.panel.current_mut()?.poll(now)?;
        Some(self.save(pending).await)
    }

    /// Saves unsaved text of the open note without waiting.
    pub async fn flush(&mut self) -> Option<SaveAttempt> {
        self.user_id?;
        let pending = self.panel.current_mut()?.flush()?;
        Some(self.save(pending).await)
    }

    /// Closes the open note, saving unsaved text.
    pub async fn close(&mut self) -> Option<SaveAttempt> {
        let pending = self.panel.close()?;
        if self.user_id.is_none() {
            self.panel.discard(&pending.card_id);
            return None;
        }
        Some(self.save(pending).await)
    }

    async fn save(&mut self, pending: PendingSave) -> SaveAttempt {
        let Some(user_id) = self.user_id else {
            tracing::debug!(card = %pending.card_id, "note save skipped without a user");
            return SaveAttempt::Failed {
                message: "not signed in".to_owned(),
            };
        };

        let now = self.clock.now();
        let record = NoteRecord {
            user_id,
            card_id: pending.card_id.clone(),
            content: pending.content.clone(),
            updated_at: now,
        };
        let attempt = match self.repo.upsert_note(&record).await {
            Ok(()) => SaveAttempt::Saved { at: now },
            Err(err) => {
                let err = NoteError::Save(err);
                tracing::error!(card = %pending.card_id, error = %err, "note save failed");
                SaveAttempt::Failed {
                    message: err.to_string(),
                }
            }
        };

        let result = match &attempt {
            SaveAttempt::Saved { at } => Ok(*at),
            SaveAttempt::Failed { message } => Err(message.clone()),
        };
        self.panel.finish(&pending, result);
        attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use course_core::autosave::SaveStatus;
    use course_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;

    fn user() -> UserId {
        UserId::new(uuid::Uuid::from_u128(3))
    }

    fn editor(repo: &InMemoryRepository, user_id: Option<UserId>) -> NoteEditor {
        NoteEditor::new(
            fixed_clock(),
            user_id,
            Duration::milliseconds(1_000),
            Arc::new(repo.clone()),
        )
    }

    async fn stored(repo: &InMemoryRepository, card: &str) -> Option<String> {
        repo.load_note(user(), &CardId::new(card))
            .await
            .unwrap()
            .map(|note| note.content)
    }

    #[tokio::test]
    async fn open_loads_existing_note() {
        let repo = InMemoryRepository::new();
        repo.upsert_note(&NoteRecord {
            user_id: user(),
            card_id: CardId::new("ppg-1"),
            content: "draft".into(),
            updated_at: fixed_now(),
        })
        .await
        .unwrap();
        let mut editor = editor(&repo, Some(user()));

        editor.open(CardId::new("ppg-1")).await;

        let buffer = editor.current().unwrap();
        assert_eq!(buffer.content(), "draft");
        assert_eq!(buffer.last_saved(), Some(fixed_now()));
        assert_eq!(buffer.status(), SaveStatus::Idle);
    }

    #[tokio::test]
    async fn missing_note_opens_empty() {
        let repo = InMemoryRepository::new();
        let mut editor = editor(&repo, Some(user()));

        editor.open(CardId::new("ppg-9")).await;

        assert_eq!(editor.current().unwrap().content(), "");
    }

    #[tokio::test]
    async fn saves_after_debounce_elapses() {
        let repo = InMemoryRepository::new();
        let mut editor = editor(&repo, Some(user()));
        editor.open(CardId::new("ppg-1")).await;
        let start = fixed_now();

        editor.edit_at("hello", start);
        assert_eq!(editor.tick_at(start + Duration::milliseconds(999)).await, None);
        assert_eq!(stored(&repo, "ppg-1").await, None);

        let attempt = editor.tick_at(start + Duration::milliseconds(1_000)).await;

        assert_eq!(attempt, Some(SaveAttempt::Saved { at: fixed_now() }));
        assert_eq!(stored(&repo, "ppg-1").await.as_deref(), Some("hello"));
        assert_eq!(editor.current().unwrap().status(), SaveStatus::Idle);
    }

    #[tokio::test]
    async fn time_until_due_follows_the_debounce_deadline() {
        let repo = InMemoryRepository::new();
        let mut editor = editor(&repo, Some(user()));
        editor.open(CardId::new("ppg-1")).await;
        assert_eq!(editor.time_until_due(), None);

        editor.edit_at("soon", fixed_now());
        assert_eq!(
            editor.time_until_due(),
            Some(std::time::Duration::from_secs(1))
        );

        editor.edit_at("overdue", fixed_now() - Duration::seconds(5));
        assert_eq!(editor.time_until_due(), Some(std::time::Duration::ZERO));
    }

    #[tokio::test]
    async fn stale_load_is_discarded() {
        let repo = InMemoryRepository::new();
        let mut editor = editor(&repo, Some(user()));

        let (first, _) = editor.begin_open(CardId::new("ppg-1")).await;
        let (_second, flushed) = editor.begin_open(CardId::new("ppg-2")).await;

        assert_eq!(flushed, None);

        assert!(!editor.resolve_load(&first, Some(("old card".into(), None))));
        let buffer = editor.current().unwrap();
        assert_eq!(buffer.card_id(), &CardId::new("ppg-2"));
        assert_eq!(buffer.content(), "");
    }

    #[tokio::test]
    async fn navigating_away_flushes_dirty_note() {
        let repo = InMemoryRepository::new();
        let mut editor = editor(&repo, Some(user()));
        editor.open(CardId::new("ppg-1")).await;
        editor.edit_at("unsaved", fixed_now());

        let flushed = editor.open(CardId::new("ppg-2")).await;

        assert_eq!(flushed, Some(SaveAttempt::Saved { at: fixed_now() }));
        assert_eq!(stored(&repo, "ppg-1").await.as_deref(), Some("unsaved"));
    }

    #[tokio::test]
    async fn anonymous_edits_are_never_persisted() {
        let repo = InMemoryRepository::new();
        let mut editor = editor(&repo, None);
        editor.open(CardId::new("ppg-1")).await;

        assert!(editor.edit_at("local only", fixed_now()));
        assert_eq!(editor.tick_at(fixed_now() + Duration::seconds(5)).await, None);

        let buffer = editor.current().unwrap();
        assert_eq!(buffer.content(), "local only");
        assert_eq!(buffer.status(), SaveStatus::Dirty);
        assert_eq!(stored(&repo, "ppg-1").await, None);
    }

    #[test]
    fn edit_without_open_card_is_rejected() {
        let repo = InMemoryRepository::new();
        let mut editor = editor(&repo, Some(user()));

        assert!(!editor.edit("nowhere"));
    }
}
