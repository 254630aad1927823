//! # mm-auth-simple
//!
//! Salted SHA-256 implementation of `IdentityProvider`.
//! The same provider account always maps to the same user id, and the salt keeps
//! ids from being guessed from a known account name.

use async_trait::async_trait;
use mm_core::models::UserId;
use mm_core::traits::{IdentityProvider, SignInProvider};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// Length of issued ids, matching the 28-character uids of hosted identity services.
const USER_ID_LEN: usize = 28;

pub struct SimpleIdentityProvider {
    /// Secret salt for deriving user ids (e.g., from an environment variable)
    salt: SecretString,
    /// The signed-in user on this device
    session: RwLock<Option<UserId>>,
}

impl SimpleIdentityProvider {
    pub fn new(salt: SecretString) -> Self {
        Self {
            salt,
            session: RwLock::new(None),
        }
    }

    /// Derives a stable id, e.g. `3f9a0c...` (28 hex chars).
    fn derive_user_id(&self, provider: SignInProvider, subject: &str) -> UserId {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.expose_secret().as_bytes());
        hasher.update(provider.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(subject.as_bytes());
        let hash = hex::encode(hasher.finalize());
        UserId::new(&hash[..USER_ID_LEN])
    }
}

#[async_trait]
impl IdentityProvider for SimpleIdentityProvider {
    async fn current_session(&self) -> anyhow::Result<Option<UserId>> {
        Ok(self.session.read().await.clone())
    }

    async fn sign_in(&self, provider: SignInProvider, subject: &str) -> anyhow::Result<UserId> {
        let subject = subject.trim();
        if subject.is_empty() {
            anyhow::bail!("sign in with {provider} failed: no account returned");
        }
        let uid = self.derive_user_id(provider, subject);
        *self.session.write().await = Some(uid.clone());
        tracing::info!(%provider, user = %uid, "signed in");
        Ok(uid)
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        if let Some(uid) = self.session.write().await.take() {
            tracing::info!(user = %uid, "signed out");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(salt: &str) -> SimpleIdentityProvider {
        SimpleIdentityProvider::new(SecretString::from(salt.to_string()))
    }

    #[tokio::test]
    async fn ids_are_stable_per_account() {
        let auth = provider("pepper");
        let first = auth.sign_in(SignInProvider::Apple, "alice@icloud").await.unwrap();
        let again = auth.sign_in(SignInProvider::Apple, "alice@icloud").await.unwrap();
        let google = auth.sign_in(SignInProvider::Google, "alice@icloud").await.unwrap();
        assert_eq!(first, again);
        assert_ne!(first, google);
        assert_eq!(first.as_str().len(), USER_ID_LEN);
    }

    #[tokio::test]
    async fn salt_changes_ids() {
        let a = provider("one").sign_in(SignInProvider::Apple, "bob").await.unwrap();
        let b = provider("two").sign_in(SignInProvider::Apple, "bob").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn session_follows_sign_in_and_out() {
        let auth = provider("pepper");
        assert!(auth.current_session().await.unwrap().is_none());
        let uid = auth.sign_in(SignInProvider::Google, "carol").await.unwrap();
        assert_eq!(auth.current_session().await.unwrap(), Some(uid));
        auth.sign_out().await.unwrap();
        assert!(auth.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_subject_is_rejected() {
        let auth = provider("pepper");
        assert!(auth.sign_in(SignInProvider::Apple, "  ").await.is_err());
        assert!(auth.current_session().await.unwrap().is_none());
    }
}
