//! Authentication types
//!
//! The user record handed out by the identity provider, the credentials it
//! accepts, and the result of a sign-in.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::form_urlencoded;

/// Seconds before expiry at which an ID token is considered stale
pub(crate) const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// Signed-in user account
///
/// Created on successful authentication and dropped on sign-out. Use
/// `Arc<User>` for shared ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique Firebase user ID
    pub uid: String,

    /// Email address (if available)
    pub email: Option<String>,

    /// Display name (if available)
    pub display_name: Option<String>,

    /// Photo URL (if available)
    pub photo_url: Option<String>,

    /// ID token (JWT) - internal use
    #[serde(skip)]
    pub(crate) id_token: Option<String>,

    /// Refresh token - internal use
    #[serde(skip)]
    pub(crate) refresh_token: Option<String>,

    /// Token expiration timestamp (seconds since epoch) - internal use
    #[serde(skip)]
    pub(crate) token_expiration: Option<i64>,
}

impl User {
    /// Create a user with no profile data and no tokens
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            email,
            display_name: None,
            photo_url: None,
            id_token: None,
            refresh_token: None,
            token_expiration: None,
        }
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the photo URL
    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    /// Whether the ID token must be refreshed before use at `now` (epoch seconds)
    ///
    /// Tokens without expiry information are assumed fresh.
    pub(crate) fn token_needs_refresh(&self, now: i64) -> bool {
        match self.token_expiration {
            None => false,
            Some(expiration) => now >= expiration - TOKEN_REFRESH_MARGIN_SECS,
        }
    }
}

/// Authentication credential from an external identity provider
#[derive(Debug, Clone)]
pub enum Credential {
    /// Google Sign-In credential
    Google {
        /// Google Sign-In ID token
        id_token: Option<String>,
        /// Google Sign-In access token
        access_token: Option<String>,
    },
}

impl Credential {
    /// Google credential from an ID token obtained by the platform sign-in flow
    pub fn google(id_token: impl Into<String>) -> Self {
        Credential::Google {
            id_token: Some(id_token.into()),
            access_token: None,
        }
    }

    /// Get the provider ID for this credential
    pub fn provider_id(&self) -> &str {
        match self {
            Credential::Google { .. } => "google.com",
        }
    }

    /// Form-encoded `postBody` for `accounts:signInWithIdp`
    pub(crate) fn post_body(&self) -> Option<String> {
        let Credential::Google { id_token, access_token } = self;
        if id_token.is_none() && access_token.is_none() {
            return None;
        }

        let mut body = form_urlencoded::Serializer::new(String::new());
        body.append_pair("providerId", self.provider_id());
        if let Some(token) = id_token {
            body.append_pair("id_token", token);
        }
        if let Some(token) = access_token {
            body.append_pair("access_token", token);
        }
        Some(body.finish())
    }
}

/// Result of a successful sign-in or sign-up
#[derive(Debug, Clone)]
pub struct AuthResult {
    /// The signed-in user
    pub user: Arc<User>,

    /// Additional provider information
    pub additional_user_info: Option<AdditionalUserInfo>,
}

/// Provider details returned alongside a sign-in
#[derive(Debug, Clone)]
pub struct AdditionalUserInfo {
    /// Provider ID ("password", "google.com", ...)
    pub provider_id: String,

    /// Whether the account was created by this sign-in
    pub is_new_user: bool,
}
