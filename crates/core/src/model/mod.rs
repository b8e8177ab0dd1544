pub mod checklist;
mod curriculum;
mod diagnostic;
mod ids;
mod progress;
mod settings;

pub use checklist::{ChecklistItem, ContentSection};
pub use curriculum::{
    Card, CardDraft, CardKind, Curriculum, CurriculumDraft, CurriculumError, Module, ModuleDraft,
};
pub use diagnostic::{
    CRITERIA, Criterion, Diagnostic, DiagnosticError, Level, NEXT_STEPS, ScoreBand, criterion,
};
pub use ids::{CardId, ChecklistRowId, ModuleId, ParseIdError, UserId};
pub use progress::{
    ChecklistMap, ChecklistStats, CompletionLookup, ProgressMap, completion_percentage,
};
pub use settings::{DEFAULT_NOTE_DEBOUNCE_MS, EngineSettings, EngineSettingsDraft, SettingsError};
