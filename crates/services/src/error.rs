//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::DiagnosticError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

pub use course_core::unlock::AccessDenied;

/// Errors raised while loading or saving a note.
///
/// Save failures are rendered into the buffer's sticky error message.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NoteError {
    #[error("note save failed: {0}")]
    Save(#[source] StorageError),
    #[error("note load failed: {0}")]
    Load(#[source] StorageError),
}

/// Errors emitted by `DiagnosticService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiagnosticServiceError {
    #[error("sign in to save the diagnostic")]
    NotAuthenticated,
    #[error(transparent)]
    Diagnostic(#[from] DiagnosticError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error("onboarding card {0} is not part of the curriculum")]
    UnknownOnboardingCard(String),
}
