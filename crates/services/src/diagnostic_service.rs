use std::sync::Arc;

use course_core::model::{Diagnostic, Level, UserId};
use storage::repository::{DiagnosticRecord, DiagnosticRepository};

use crate::error::DiagnosticServiceError;
use crate::Clock;

/// Loads and stores the profile self-assessment of a user.
#[derive(Clone)]
pub struct DiagnosticService {
    clock: Clock,
    repo: Arc<dyn DiagnosticRepository>,
}

impl DiagnosticService {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn DiagnosticRepository>) -> Self {
        Self { clock, repo }
    }

    /// Stored answers of `user_id`, or an empty diagnostic when there are
    /// none, no user is signed in, or the read fails.
    pub async fn load(&self, user_id: Option<UserId>) -> Diagnostic {
        let Some(user_id) = user_id else {
            return Diagnostic::new();
        };
        match self.repo.load_diagnostic(user_id).await {
            Ok(Some(record)) => record.diagnostic,
            Ok(None) => Diagnostic::new(),
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "failed to load diagnostic");
                Diagnostic::new()
            }
        }
    }

    /// Persist `diagnostic` as the answers of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `DiagnosticServiceError::NotAuthenticated` without a user.
    /// Returns `DiagnosticServiceError::Storage` if persistence fails.
    pub async fn save(
        &self,
        user_id: Option<UserId>,
        diagnostic: &Diagnostic,
    ) -> Result<DiagnosticRecord, DiagnosticServiceError> {
        let user_id = user_id.ok_or(DiagnosticServiceError::NotAuthenticated)?;
        let record = DiagnosticRecord::new(user_id, diagnostic.clone(), self.clock.now());
        self.repo.upsert_diagnostic(&record).await?;
        tracing::info!(%user_id, score = record.score, "diagnostic saved");
        Ok(record)
    }

    /// Merge raw `criterion=level` answers into the stored diagnostic, mark
    /// `selected_steps`, clear `cleared_steps` and save it.
    ///
    /// # Errors
    ///
    /// Returns `DiagnosticServiceError::Diagnostic` for unknown criteria,
    /// levels or next steps.
    /// Returns `DiagnosticServiceError::NotAuthenticated` without a user.
    /// Returns `DiagnosticServiceError::Storage` if persistence fails.
    pub async fn update(
        &self,
        user_id: Option<UserId>,
        answers: &[(&str, &str)],
        selected_steps: &[&str],
        cleared_steps: &[&str],
    ) -> Result<DiagnosticRecord, DiagnosticServiceError> {
        if user_id.is_none() {
            return Err(DiagnosticServiceError::NotAuthenticated);
        }
        let mut diagnostic = self.load(user_id).await;
        for (criterion_id, level) in answers {
            diagnostic.answer(criterion_id, Level::parse(level)?)?;
        }
        for step in selected_steps {
            diagnostic.set_next_step(step, true)?;
        }
        for step in cleared_steps {
            diagnostic.set_next_step(step, false)?;
        }
        self.save(user_id, &diagnostic).await
    }
}
