use thiserror::Error;

use crate::model::{CurriculumError, DiagnosticError, SettingsError};

/// Any validation failure raised while building engine inputs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Curriculum(#[from] CurriculumError),
    #[error(transparent)]
    Diagnostic(#[from] DiagnosticError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
