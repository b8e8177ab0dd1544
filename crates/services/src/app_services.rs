use std::sync::Arc;

use course_core::model::{Curriculum, EngineSettings, UserId};
use storage::repository::Storage;

use crate::error::AppServicesError;
use crate::session::UserSession;
use crate::Clock;

/// Assembles storage, curriculum and settings, and opens user sessions.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    storage: Storage,
    curriculum: Arc<Curriculum>,
    settings: EngineSettings,
}

impl AppServices {
    /// # Errors
    ///
    /// Returns `AppServicesError::UnknownOnboardingCard` when the configured
    /// onboarding card is not part of `curriculum`.
    pub fn new(
        clock: Clock,
        storage: Storage,
        curriculum: Curriculum,
        settings: EngineSettings,
    ) -> Result<Self, AppServicesError> {
        if let Some(card_id) = settings.onboarding_card() {
            if curriculum.card(card_id).is_none() {
                return Err(AppServicesError::UnknownOnboardingCard(
                    card_id.as_str().to_owned(),
                ));
            }
        }
        Ok(Self {
            clock,
            storage,
            curriculum: Arc::new(curriculum),
            settings,
        })
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the
    /// settings do not match the curriculum.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        curriculum: Curriculum,
        settings: EngineSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::new(clock, storage, curriculum, settings)
    }

    /// Build services backed by in-memory storage.
    ///
    /// # Errors
    ///
    /// See [`AppServices::new`].
    pub fn in_memory(
        clock: Clock,
        curriculum: Curriculum,
        settings: EngineSettings,
    ) -> Result<Self, AppServicesError> {
        Self::new(clock, Storage::in_memory(), curriculum, settings)
    }

    #[must_use]
    pub fn curriculum(&self) -> Arc<Curriculum> {
        Arc::clone(&self.curriculum)
    }

    /// Session for whatever identity the caller resolved.
    pub async fn session_for(&self, user_id: Option<UserId>) -> UserSession {
        match user_id {
            Some(user_id) => self.sign_in(user_id).await,
            None => self.anonymous(),
        }
    }

    pub async fn sign_in(&self, user_id: UserId) -> UserSession {
        UserSession::sign_in(
            &self.storage,
            self.curriculum(),
            &self.settings,
            self.clock,
            user_id,
        )
        .await
    }

    #[must_use]
    pub fn anonymous(&self) -> UserSession {
        UserSession::anonymous(&self.storage, self.curriculum(), &self.settings, self.clock)
    }
}
