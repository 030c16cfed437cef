//! Provider seams
//!
//! The session holder and the hospital API client depend on these traits
//! rather than on [`Auth`] directly, so both can run against in-memory
//! providers.

use crate::auth::types::{Credential, User};
use crate::auth::Auth;
use crate::error::ClientError;
use async_trait::async_trait;
use std::sync::Arc;

/// Identity provider driven by the session holder
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// User restored from a persisted credential, if any
    async fn current_user(&self) -> Option<Arc<User>>;

    /// Sign in with email and password
    async fn sign_in_with_email(&self, email: &str, password: &str) -> Result<Arc<User>, ClientError>;

    /// Create an account with email and password
    async fn sign_up_with_email(&self, email: &str, password: &str) -> Result<Arc<User>, ClientError>;

    /// Exchange an external (Google) ID token for a session
    async fn sign_in_with_external_token(&self, id_token: &str) -> Result<Arc<User>, ClientError>;

    /// Drop the provider session
    async fn sign_out(&self) -> Result<(), ClientError>;
}

/// Supplies the bearer token attached to backend requests
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Token for the current session, or `None` when signed out
    async fn bearer_token(&self) -> Result<Option<String>, ClientError>;
}

#[async_trait]
impl IdentityProvider for Auth {
    async fn current_user(&self) -> Option<Arc<User>> {
        Auth::current_user(self).await
    }

    async fn sign_in_with_email(&self, email: &str, password: &str) -> Result<Arc<User>, ClientError> {
        let result = self.sign_in_with_email_and_password(email, password).await?;
        Ok(result.user)
    }

    async fn sign_up_with_email(&self, email: &str, password: &str) -> Result<Arc<User>, ClientError> {
        let result = self.create_user_with_email_and_password(email, password).await?;
        Ok(result.user)
    }

    async fn sign_in_with_external_token(&self, id_token: &str) -> Result<Arc<User>, ClientError> {
        let result = self.sign_in_with_credential(Credential::google(id_token)).await?;
        Ok(result.user)
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        Auth::sign_out(self).await
    }
}

#[async_trait]
impl TokenSource for Auth {
    async fn bearer_token(&self) -> Result<Option<String>, ClientError> {
        if Auth::current_user(self).await.is_none() {
            return Ok(None);
        }
        self.id_token(false).await.map(Some)
    }
}
