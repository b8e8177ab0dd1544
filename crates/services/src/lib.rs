#![forbid(unsafe_code)]

pub mod app_services;
pub mod card_view;
pub mod checklist_store;
pub mod diagnostic_service;
pub mod error;
pub mod note_editor;
pub mod progress_store;
pub mod session;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use card_view::{CardView, ChecklistItemView, SectionView};
pub use checklist_store::ChecklistStore;
pub use diagnostic_service::DiagnosticService;
pub use error::{AccessDenied, AppServicesError, DiagnosticServiceError, NoteError};
pub use note_editor::{NoteEditor, SaveAttempt};
pub use progress_store::ProgressStore;
pub use session::UserSession;
