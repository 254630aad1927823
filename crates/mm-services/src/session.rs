//! Sign-in state and the screen it routes to.

use crate::navigation::Screen;
use crate::profiles::ProfileService;
use mm_core::models::{UserId, UserProfile};
use mm_core::traits::{IdentityProvider, SignInProvider};
use mm_core::{AppError, Result};
use std::sync::Arc;
use tracing::{instrument, warn};

#[derive(Clone)]
pub struct SessionService {
    identity: Arc<dyn IdentityProvider>,
    profiles: ProfileService,
}

impl SessionService {
    pub fn new(identity: Arc<dyn IdentityProvider>, profiles: ProfileService) -> Self {
        Self { identity, profiles }
    }

    /// The signed-in user's id, or `NotAuthenticated`.
    pub async fn current_user_id(&self) -> Result<UserId> {
        self.identity
            .current_session()
            .await
            .map_err(AppError::unavailable)?
            .ok_or(AppError::NotAuthenticated)
    }

    /// The signed-in user's record, created if this is their first visit.
    pub async fn current_user(&self) -> Result<UserProfile> {
        let uid = self.current_user_id().await?;
        self.profiles.ensure_profile(&uid).await
    }

    #[instrument(skip(self, subject))]
    pub async fn sign_in(
        &self,
        provider: SignInProvider,
        subject: &str,
    ) -> Result<(UserProfile, Screen)> {
        let uid = self.identity.sign_in(provider, subject).await.map_err(|e| {
            warn!(error = %format!("{e:#}"), "sign in failed");
            AppError::NotAuthenticated
        })?;
        let profile = self.profiles.ensure_profile(&uid).await?;
        let screen = Screen::after_session(Some(&profile));
        Ok((profile, screen))
    }

    pub async fn sign_out(&self) -> Result<Screen> {
        self.identity
            .sign_out()
            .await
            .map_err(AppError::unavailable)?;
        Ok(Screen::SignIn)
    }

    /// Screen to show on launch for whatever session survived.
    pub async fn restore(&self) -> Result<Screen> {
        match self.current_user().await {
            Ok(profile) => Ok(Screen::after_session(Some(&profile))),
            Err(AppError::NotAuthenticated) => Ok(Screen::after_session(None)),
            Err(e) => Err(e),
        }
    }
}
