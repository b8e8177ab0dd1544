//! Debounced note autosave as a clock-driven state machine.
//!
//! Every edit updates the buffer at once and re-arms a single deadline.
//! Only the content present when the deadline passes is handed out for
//! persistence; intermediate edits are never written. A failed save keeps
//! the text and raises a sticky error that the next successful save clears.
//! Leaving a card never drops text: its buffer stays parked in the panel
//! until a save for it succeeds.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::model::CardId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Dirty,
    Saving,
}

/// Snapshot of a buffer handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    pub card_id: CardId,
    pub content: String,
    pub revision: u64,
}

/// The editable note of one card.
#[derive(Debug, Clone)]
pub struct NoteBuffer {
    card_id: CardId,
    content: String,
    status: SaveStatus,
    deadline: Option<DateTime<Utc>>,
    debounce: Duration,
    revision: u64,
    last_saved: Option<DateTime<Utc>>,
    save_error: Option<String>,
}

impl NoteBuffer {
    #[must_use]
    pub fn new(card_id: CardId, debounce: Duration) -> Self {
        Self {
            card_id,
            content: String::new(),
            status: SaveStatus::Idle,
            deadline: None,
            debounce,
            revision: 0,
            last_saved: None,
            save_error: None,
        }
    }

    /// Fills the buffer from storage. Ignored once the user has typed.
    pub fn load(&mut self, content: String, updated_at: Option<DateTime<Utc>>) -> bool {
        if self.revision > 0 {
            return false;
        }
        self.content = content;
        self.last_saved = updated_at;
        true
    }

    pub fn edit(&mut self, text: impl Into<String>, now: DateTime<Utc>) {
        self.content = text.into();
        self.revision += 1;
        self.status = SaveStatus::Dirty;
        self.deadline = Some(now + self.debounce);
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == SaveStatus::Dirty && self.deadline.is_some_and(|d| now >= d)
    }

    /// Starts a save when the debounce window has elapsed.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<PendingSave> {
        if !self.is_due(now) {
            return None;
        }
        Some(self.begin_save())
    }

    /// Starts a save for unsaved content regardless of the deadline. Text
    /// whose last save failed is retried.
    pub fn flush(&mut self) -> Option<PendingSave> {
        self.has_unsaved_text().then(|| self.begin_save())
    }

    /// Dirty, or idle after a failed save.
    #[must_use]
    pub fn has_unsaved_text(&self) -> bool {
        match self.status {
            SaveStatus::Dirty => true,
            SaveStatus::Idle => self.save_error.is_some(),
            SaveStatus::Saving => false,
        }
    }

    fn begin_save(&mut self) -> PendingSave {
        self.status = SaveStatus::Saving;
        self.deadline = None;
        PendingSave {
            card_id: self.card_id.clone(),
            content: self.content.clone(),
            revision: self.revision,
        }
    }

    /// Records the result of a save started by `poll` or `flush`.
    pub fn finish(&mut self, pending: &PendingSave, result: Result<DateTime<Utc>, String>) {
        match result {
            Ok(saved_at) => {
                self.last_saved = Some(saved_at);
                self.save_error = None;
            }
            Err(message) => self.save_error = Some(message),
        }
        // Edits made while saving already moved the buffer back to Dirty.
        if self.status == SaveStatus::Saving && self.revision == pending.revision {
            self.status = SaveStatus::Idle;
        }
    }

    #[must_use]
    pub fn card_id(&self) -> &CardId {
        &self.card_id
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn status(&self) -> SaveStatus {
        self.status
    }

    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.status == SaveStatus::Saving
    }

    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    #[must_use]
    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    #[must_use]
    pub fn save_error(&self) -> Option<&str> {
        self.save_error.as_deref()
    }
}

/// Identifies one note load; stale tickets are discarded on arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub card_id: CardId,
    seq: u64,
}

/// Holds the note of the card currently open, if any, plus buffers of
/// closed cards whose text is not saved yet.
#[derive(Debug, Clone)]
pub struct NotePanel {
    debounce: Duration,
    seq: u64,
    current: Option<NoteBuffer>,
    parked: HashMap<CardId, NoteBuffer>,
}

impl NotePanel {
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            seq: 0,
            current: None,
            parked: HashMap::new(),
        }
    }

    /// Switches to `card_id`, restoring its parked buffer or starting an
    /// empty one.
    ///
    /// Returns the ticket for the load to issue and, when the previous
    /// buffer held unsaved text, the save that must be flushed for it. A
    /// restored buffer keeps its text when the load arrives.
    pub fn open(&mut self, card_id: CardId) -> (LoadTicket, Option<PendingSave>) {
        let flushed = self.close();
        self.seq += 1;
        let buffer = self
            .parked
            .remove(&card_id)
            .unwrap_or_else(|| NoteBuffer::new(card_id.clone(), self.debounce));
        self.current = Some(buffer);
        (
            LoadTicket {
                card_id,
                seq: self.seq,
            },
            flushed,
        )
    }

    /// Closes the current buffer, returning a flush for unsaved text. The
    /// buffer stays parked until that flush succeeds.
    pub fn close(&mut self) -> Option<PendingSave> {
        let mut buffer = self.current.take()?;
        let pending = buffer.flush()?;
        self.parked.insert(buffer.card_id.clone(), buffer);
        Some(pending)
    }

    /// Forgets a parked buffer without saving it.
    pub fn discard(&mut self, card_id: &CardId) -> Option<NoteBuffer> {
        self.parked.remove(card_id)
    }

    /// Parked buffer of a closed card, if its text is still unsaved.
    #[must_use]
    pub fn parked(&self, card_id: &CardId) -> Option<&NoteBuffer> {
        self.parked.get(card_id)
    }

    /// Applies a finished load if its ticket still matches the open card.
    pub fn resolve_load(
        &mut self,
        ticket: &LoadTicket,
        loaded: Option<(String, Option<DateTime<Utc>>)>,
    ) -> bool {
        if ticket.seq != self.seq {
            return false;
        }
        let Some(buffer) = self.current.as_mut() else {
            return false;
        };
        if buffer.card_id != ticket.card_id {
            return false;
        }
        match loaded {
            Some((content, updated_at)) => buffer.load(content, updated_at),
            None => true,
        }
    }

    /// Routes a save result to the open or parked buffer of its card.
    /// A parked buffer is released once its text is saved. Returns `false`
    /// when no buffer holds the card any more.
    pub fn finish(&mut self, pending: &PendingSave, result: Result<DateTime<Utc>, String>) -> bool {
        if let Some(buffer) = self.current.as_mut() {
            if buffer.card_id == pending.card_id {
                buffer.finish(pending, result);
                return true;
            }
        }
        let Some(buffer) = self.parked.get_mut(&pending.card_id) else {
            return false;
        };
        buffer.finish(pending, result);
        if !buffer.has_unsaved_text() && !buffer.is_saving() {
            self.parked.remove(&pending.card_id);
        }
        true
    }

    #[must_use]
    pub fn current(&self) -> Option<&NoteBuffer> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut NoteBuffer> {
        self.current.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{fixed_clock, fixed_now};

    fn buffer() -> NoteBuffer {
        NoteBuffer::new(CardId::new("plan-1"), Duration::milliseconds(1_000))
    }

    #[test]
    fn rapid_edits_coalesce_into_one_save() {
        let mut clock = fixed_clock();
        let mut note = buffer();

        note.edit("a", clock.now());
        clock.advance_millis(100);
        note.edit("ab", clock.now());
        clock.advance_millis(100);
        note.edit("abc", clock.now());

        clock.advance_millis(999);
        assert!(note.poll(clock.now()).is_none());
        assert_eq!(note.status(), SaveStatus::Dirty);

        clock.advance_millis(1);
        let pending = note.poll(clock.now()).expect("due");
        assert_eq!(pending.content, "abc");
        assert!(note.is_saving());
        assert!(note.poll(clock.now()).is_none());
    }

    #[test]
    fn failed_save_keeps_text_and_sets_error() {
        let mut clock = fixed_clock();
        let mut note = buffer();
        note.edit("draft", clock.now());
        clock.advance_millis(1_000);
        let pending = note.poll(clock.now()).unwrap();

        note.finish(&pending, Err("offline".into()));
        assert_eq!(note.content(), "draft");
        assert_eq!(note.save_error(), Some("offline"));
        assert_eq!(note.status(), SaveStatus::Idle);
        assert!(note.last_saved().is_none());

        note.edit("draft 2", clock.now());
        clock.advance_millis(1_000);
        let pending = note.poll(clock.now()).unwrap();
        note.finish(&pending, Ok(clock.now()));
        assert!(note.save_error().is_none());
        assert_eq!(note.last_saved(), Some(clock.now()));
    }

    #[test]
    fn edit_during_save_stays_dirty() {
        let mut clock = fixed_clock();
        let mut note = buffer();
        note.edit("one", clock.now());
        clock.advance_millis(1_000);
        let pending = note.poll(clock.now()).unwrap();

        note.edit("two", clock.now());
        note.finish(&pending, Ok(clock.now()));
        assert_eq!(note.status(), SaveStatus::Dirty);

        clock.advance_millis(1_000);
        assert_eq!(note.poll(clock.now()).unwrap().content, "two");
    }

    #[test]
    fn load_does_not_clobber_typed_text() {
        let mut note = buffer();
        note.edit("typed", fixed_now());
        assert!(!note.load("stored".into(), None));
        assert_eq!(note.content(), "typed");
    }

    #[test]
    fn stale_load_is_discarded() {
        let mut panel = NotePanel::new(Duration::milliseconds(1_000));
        let (first, _) = panel.open(CardId::new("a"));
        let (second, _) = panel.open(CardId::new("b"));

        assert!(!panel.resolve_load(&first, Some(("note a".into(), None))));
        assert_eq!(panel.current().unwrap().content(), "");

        assert!(panel.resolve_load(&second, Some(("note b".into(), None))));
        assert_eq!(panel.current().unwrap().content(), "note b");
    }

    #[test]
    fn reopening_same_card_invalidates_older_ticket() {
        let mut panel = NotePanel::new(Duration::milliseconds(1_000));
        let (old, _) = panel.open(CardId::new("a"));
        let (new, _) = panel.open(CardId::new("a"));
        assert!(!panel.resolve_load(&old, None));
        assert!(panel.resolve_load(&new, None));
    }

    #[test]
    fn navigating_away_flushes_dirty_buffer() {
        let mut panel = NotePanel::new(Duration::milliseconds(1_000));
        let (ticket, _) = panel.open(CardId::new("a"));
        panel.resolve_load(&ticket, None);
        panel.current_mut().unwrap().edit("unsaved", fixed_now());

        let (_, flushed) = panel.open(CardId::new("b"));
        let flushed = flushed.expect("dirty buffer flushed");
        assert_eq!(flushed.card_id, CardId::new("a"));
        assert_eq!(flushed.content, "unsaved");
        assert!(panel.parked(&CardId::new("a")).is_some());
        assert!(panel.finish(&flushed, Ok(fixed_now())));
        assert!(panel.parked(&CardId::new("a")).is_none());
        assert!(!panel.finish(&flushed, Ok(fixed_now())));
    }

    #[test]
    fn failed_flush_keeps_buffer_for_reopen() {
        let mut panel = NotePanel::new(Duration::milliseconds(1_000));
        panel.open(CardId::new("a"));
        panel.current_mut().unwrap().edit("keep me", fixed_now());

        let (_, flushed) = panel.open(CardId::new("b"));
        let flushed = flushed.unwrap();
        assert!(panel.finish(&flushed, Err("offline".into())));
        assert!(panel.parked(&CardId::new("a")).unwrap().has_unsaved_text());

        let (ticket, retry) = panel.open(CardId::new("a"));
        assert!(retry.is_none());
        assert!(!panel.resolve_load(&ticket, Some((String::new(), None))));
        let buffer = panel.current_mut().unwrap();
        assert_eq!(buffer.content(), "keep me");
        assert_eq!(buffer.save_error(), Some("offline"));
        assert_eq!(buffer.flush().unwrap().content, "keep me");
    }
}
