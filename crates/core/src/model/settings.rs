use chrono::Duration;
use thiserror::Error;

use crate::model::ids::CardId;

pub const DEFAULT_NOTE_DEBOUNCE_MS: u32 = 1_000;
const MIN_NOTE_DEBOUNCE_MS: u32 = 50;
const MAX_NOTE_DEBOUNCE_MS: u32 = 60_000;

/// Tunables of the progress engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    note_debounce_ms: u32,
    onboarding_card: Option<CardId>,
}

#[derive(Clone, Debug, Default)]
pub struct EngineSettingsDraft {
    pub note_debounce_ms: Option<u32>,
    pub onboarding_card: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("note debounce must be between 50 and 60000 ms, got {0}")]
    InvalidNoteDebounce(u32),
}

impl EngineSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and normalize the draft.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the debounce is out of range.
    pub fn validate(self) -> Result<EngineSettings, SettingsError> {
        let note_debounce_ms = self.note_debounce_ms.unwrap_or(DEFAULT_NOTE_DEBOUNCE_MS);
        if !(MIN_NOTE_DEBOUNCE_MS..=MAX_NOTE_DEBOUNCE_MS).contains(&note_debounce_ms) {
            return Err(SettingsError::InvalidNoteDebounce(note_debounce_ms));
        }
        let onboarding_card = self
            .onboarding_card
            .map(|raw| raw.trim().to_owned())
            .filter(|raw| !raw.is_empty())
            .map(CardId::new);

        Ok(EngineSettings {
            note_debounce_ms,
            onboarding_card,
        })
    }
}

impl EngineSettings {
    #[must_use]
    pub fn note_debounce(&self) -> Duration {
        Duration::milliseconds(i64::from(self.note_debounce_ms))
    }

    /// Explicit onboarding card; `None` means "first card of the curriculum".
    #[must_use]
    pub fn onboarding_card(&self) -> Option<&CardId> {
        self.onboarding_card.as_ref()
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            note_debounce_ms: DEFAULT_NOTE_DEBOUNCE_MS,
            onboarding_card: None,
        }
    }
}
