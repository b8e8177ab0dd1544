use std::sync::Arc;

use course_core::model::{CardId, Curriculum, Diagnostic, EngineSettings, UserId};
use course_core::optimistic::WriteOutcome;
use course_core::unlock::{self, AccessGate, ModuleState};
use storage::repository::{DiagnosticRecord, Storage};

use crate::card_view::CardView;
use crate::checklist_store::ChecklistStore;
use crate::diagnostic_service::DiagnosticService;
use crate::error::{AccessDenied, DiagnosticServiceError};
use crate::note_editor::{NoteEditor, SaveAttempt};
use crate::progress_store::ProgressStore;
use crate::Clock;

/// State owned by one signed-in (or anonymous) user.
///
/// Created on sign-in with the user's progress loaded and consumed on
/// sign-out. Anonymous sessions answer every query from empty state and
/// ignore writes.
pub struct UserSession {
    user_id: Option<UserId>,
    curriculum: Arc<Curriculum>,
    gate: AccessGate,
    progress: ProgressStore,
    checklist: ChecklistStore,
    notes: NoteEditor,
    diagnostics: DiagnosticService,
}

impl UserSession {
    #[must_use]
    pub fn anonymous(
        storage: &Storage,
        curriculum: Arc<Curriculum>,
        settings: &EngineSettings,
        clock: Clock,
    ) -> Self {
        Self::build(storage, curriculum, settings, clock, None)
    }

    /// Open a session for `user_id`, loading card and checklist progress.
    pub async fn sign_in(
        storage: &Storage,
        curriculum: Arc<Curriculum>,
        settings: &EngineSettings,
        clock: Clock,
        user_id: UserId,
    ) -> Self {
        let mut session = Self::build(storage, curriculum, settings, clock, Some(user_id));
        session.progress.load_all(user_id).await;
        session.checklist.load_all(user_id, None).await;
        tracing::info!(%user_id, "session started");
        session
    }

    fn build(
        storage: &Storage,
        curriculum: Arc<Curriculum>,
        settings: &EngineSettings,
        clock: Clock,
        user_id: Option<UserId>,
    ) -> Self {
        let gate = AccessGate::for_curriculum(&curriculum, settings.onboarding_card());
        Self {
            user_id,
            gate,
            curriculum,
            progress: ProgressStore::new(clock, Arc::clone(&storage.progress)),
            checklist: ChecklistStore::new(Arc::clone(&storage.checklist)),
            notes: NoteEditor::new(
                clock,
                user_id,
                settings.note_debounce(),
                Arc::clone(&storage.notes),
            ),
            diagnostics: DiagnosticService::new(clock, Arc::clone(&storage.diagnostics)),
        }
    }

    /// End the session, saving any unsaved note text first.
    pub async fn sign_out(mut self) -> Option<SaveAttempt> {
        let flushed = self.notes.close().await;
        self.progress.reset();
        self.checklist.reset();
        if let Some(user_id) = self.user_id {
            tracing::info!(%user_id, "session ended");
        }
        flushed
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    #[must_use]
    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn progress_mut(&mut self) -> &mut ProgressStore {
        &mut self.progress
    }

    #[must_use]
    pub fn checklist(&self) -> &ChecklistStore {
        &self.checklist
    }

    pub fn checklist_mut(&mut self) -> &mut ChecklistStore {
        &mut self.checklist
    }

    #[must_use]
    pub fn notes(&self) -> &NoteEditor {
        &self.notes
    }

    pub fn notes_mut(&mut self) -> &mut NoteEditor {
        &mut self.notes
    }

    // ─── Board ────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn board(&self) -> Vec<ModuleState> {
        unlock::module_states(&self.curriculum, &self.progress)
    }

    #[must_use]
    pub fn is_module_locked(&self, index: usize) -> bool {
        unlock::is_locked(index, self.curriculum.modules(), &self.progress)
    }

    /// Completion over every card of the course, bonus cards included.
    #[must_use]
    pub fn overall_percentage(&self) -> u8 {
        self.progress
            .completion_percentage(self.curriculum.card_ids())
    }

    #[must_use]
    pub fn card_view(&self, card_id: &CardId) -> Option<CardView> {
        self.curriculum
            .card(card_id)
            .map(|card| CardView::build(card, &self.progress, &self.checklist))
    }

    /// Whether `card_id` may be opened or changed with current progress.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` when the card is unknown, the onboarding card
    /// is not completed yet or the card's module is locked.
    pub fn authorize(&self, card_id: &CardId) -> Result<(), AccessDenied> {
        self.gate
            .check_open(&self.curriculum, card_id, &self.progress)
            .inspect_err(|denied| {
                tracing::warn!(card = %card_id, reason = %denied, "card access refused");
            })
    }

    /// Open a card for reading: checks access, refreshes the card's
    /// checklist rows and loads its note.
    ///
    /// # Errors
    ///
    /// See [`UserSession::authorize`].
    pub async fn open_card(&mut self, card_id: &CardId) -> Result<CardView, AccessDenied> {
        self.authorize(card_id)?;

        if let Some(user_id) = self.user_id {
            self.checklist.load_all(user_id, Some(card_id)).await;
        }
        if let Some(SaveAttempt::Failed { message }) = self.notes.open(card_id.clone()).await {
            tracing::warn!(card = %card_id, %message, "previous note kept unsaved");
        }
        self.card_view(card_id)
            .ok_or_else(|| AccessDenied::UnknownCard(card_id.clone()))
    }

    /// Card state for an accessible card, without touching its note.
    ///
    /// # Errors
    ///
    /// See [`UserSession::authorize`].
    pub fn checklist_view(&self, card_id: &CardId) -> Result<CardView, AccessDenied> {
        self.authorize(card_id)?;
        self.card_view(card_id)
            .ok_or_else(|| AccessDenied::UnknownCard(card_id.clone()))
    }

    // ─── Writes ───────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// See [`UserSession::authorize`].
    pub async fn toggle_card(&mut self, card_id: &CardId) -> Result<WriteOutcome, AccessDenied> {
        self.authorize(card_id)?;
        Ok(self.progress.toggle(card_id).await)
    }

    /// # Errors
    ///
    /// See [`UserSession::authorize`].
    pub async fn toggle_item(
        &mut self,
        card_id: &CardId,
        index: usize,
    ) -> Result<WriteOutcome, AccessDenied> {
        self.authorize(card_id)?;
        Ok(self.checklist.toggle(card_id, index).await)
    }

    // ─── Diagnostic ───────────────────────────────────────────────────────────

    pub async fn load_diagnostic(&self) -> Diagnostic {
        self.diagnostics.load(self.user_id).await
    }

    /// # Errors
    ///
    /// See [`DiagnosticService::save`].
    pub async fn save_diagnostic(
        &self,
        diagnostic: &Diagnostic,
    ) -> Result<DiagnosticRecord, DiagnosticServiceError> {
        self.diagnostics.save(self.user_id, diagnostic).await
    }

    /// # Errors
    ///
    /// See [`DiagnosticService::update`].
    pub async fn update_diagnostic(
        &self,
        answers: &[(&str, &str)],
        selected_steps: &[&str],
        cleared_steps: &[&str],
    ) -> Result<DiagnosticRecord, DiagnosticServiceError> {
        self.diagnostics
            .update(self.user_id, answers, selected_steps, cleared_steps)
            .await
    }
}
