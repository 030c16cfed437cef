//! Identity provider client
//!
//! Talks to the Firebase Identity Toolkit REST API for email/password and
//! Google sign-in, keeps the current user, and broadcasts auth state changes.

use crate::auth::types::{AdditionalUserInfo, AuthResult, Credential, User};
use crate::error::{AuthError, ClientError};
use async_stream::stream;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Default Identity Toolkit endpoint
pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1/";

/// Default Secure Token endpoint
pub const DEFAULT_SECURE_TOKEN_BASE_URL: &str = "https://securetoken.googleapis.com/v1/";

/// Endpoint configuration for [`Auth`]
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Firebase web API key
    pub api_key: String,
    /// Identity Toolkit base URL, ending with `/`
    pub identity_base_url: String,
    /// Secure Token base URL, ending with `/`
    pub secure_token_base_url: String,
}

impl AuthConfig {
    /// Config pointing at the production Google endpoints
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            identity_base_url: DEFAULT_IDENTITY_BASE_URL.to_string(),
            secure_token_base_url: DEFAULT_SECURE_TOKEN_BASE_URL.to_string(),
        }
    }
}

/// Identity provider session
///
/// Cheap to clone; clones share the current user and the state channel.
#[derive(Clone)]
pub struct Auth {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    config: AuthConfig,
    current_user: RwLock<Option<Arc<User>>>,
    http_client: reqwest::Client,
    state_tx: broadcast::Sender<Option<Arc<User>>>,
}

impl Auth {
    /// Create an identity client
    ///
    /// # Example
    /// ```no_run
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// use swaasthya_client::auth::{Auth, AuthConfig};
    ///
    /// let auth = Auth::new(AuthConfig::new("YOUR_API_KEY"), reqwest::Client::new())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: AuthConfig, http_client: reqwest::Client) -> Result<Self, ClientError> {
        // Validate API key (error case first)
        if config.api_key.is_empty() {
            return Err(ClientError::config("Firebase API key not configured"));
        }

        // Create broadcast channel for auth state changes (capacity: 16)
        let (state_tx, _) = broadcast::channel(16);

        Ok(Auth {
            inner: Arc::new(AuthInner {
                config,
                current_user: RwLock::new(None),
                http_client,
                state_tx,
            }),
        })
    }

    /// Get the current signed-in user
    ///
    /// Returns None if no user is currently signed in.
    pub async fn current_user(&self) -> Option<Arc<User>> {
        self.inner.current_user.read().await.clone()
    }

    /// Sign out the current user
    ///
    /// Identity Toolkit sessions are client-held, so this only drops the
    /// local user. Always succeeds.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        self.set_current_user(None).await;
        Ok(())
    }

    /// Internal: Set current user and notify listeners
    pub(crate) async fn set_current_user(&self, user: Option<Arc<User>>) {
        let mut current = self.inner.current_user.write().await;
        *current = user.clone();

        // Broadcast state change (ignore error if no listeners)
        let _ = self.inner.state_tx.send(user);
    }

    /// Subscribe to authentication state changes
    ///
    /// The stream immediately yields the current user, then the user after
    /// every sign-in and sign-out.
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(auth: swaasthya_client::auth::Auth) {
    /// use futures::StreamExt;
    ///
    /// let mut stream = auth.auth_state_changes().await;
    /// while let Some(user) = stream.next().await {
    ///     match user {
    ///         Some(u) => println!("User signed in: {}", u.uid),
    ///         None => println!("User signed out"),
    ///     }
    /// }
    /// # }
    /// ```
    pub async fn auth_state_changes(&self) -> Pin<Box<dyn Stream<Item = Option<Arc<User>>> + Send>> {
        let initial_user = self.current_user().await;
        let mut rx = self.inner.state_tx.subscribe();

        Box::pin(stream! {
            yield initial_user;

            loop {
                let user = match rx.recv().await {
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Ok(u) => u,
                };
                yield user;
            }
        })
    }

    /// Sign in with email and password
    pub async fn sign_in_with_email_and_password(
        &self,
        email: impl AsRef<str>,
        password: impl AsRef<str>,
    ) -> Result<AuthResult, ClientError> {
        let email = email.as_ref();
        let password = password.as_ref();

        // Validate input (error case first)
        if email.trim().is_empty() {
            return Err(AuthError::InvalidEmail.into());
        }
        if password.is_empty() {
            return Err(AuthError::InvalidPassword.into());
        }

        let response: SignInResponse = self
            .post_identity(
                "accounts:signInWithPassword",
                serde_json::json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true
                }),
            )
            .await?;

        Ok(self.complete_sign_in(response, "password", false).await)
    }

    /// Create new user with email and password
    pub async fn create_user_with_email_and_password(
        &self,
        email: impl AsRef<str>,
        password: impl AsRef<str>,
    ) -> Result<AuthResult, ClientError> {
        let email = email.as_ref();
        let password = password.as_ref();

        // Validate input (error case first)
        if email.trim().is_empty() {
            return Err(AuthError::InvalidEmail.into());
        }
        if password.is_empty() {
            return Err(AuthError::InvalidPassword.into());
        }

        let response: SignInResponse = self
            .post_identity(
                "accounts:signUp",
                serde_json::json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true
                }),
            )
            .await?;

        Ok(self.complete_sign_in(response, "password", true).await)
    }

    /// Sign in with an external provider credential
    ///
    /// Exchanges a token obtained from Google (or another OIDC provider) for
    /// a Firebase session.
    pub async fn sign_in_with_credential(&self, credential: Credential) -> Result<AuthResult, ClientError> {
        // Error-first: at least one token must be present
        let Some(post_body) = credential.post_body() else {
            return Err(AuthError::InvalidCredential(format!(
                "{} credential requires id_token or access_token",
                credential.provider_id()
            ))
            .into());
        };

        let response: SignInResponse = self
            .post_identity(
                "accounts:signInWithIdp",
                serde_json::json!({
                    "postBody": post_body,
                    "requestUri": "http://localhost",
                    "returnSecureToken": true,
                    "returnIdpCredential": true
                }),
            )
            .await?;

        let is_new_user = response.is_new_user.unwrap_or(false);
        Ok(self.complete_sign_in(response, credential.provider_id(), is_new_user).await)
    }

    /// Get an ID token for the current user
    ///
    /// Refreshes through the Secure Token endpoint when `force_refresh` is set
    /// or the token expires within five minutes; the refreshed token replaces
    /// the stored one without emitting a state change.
    pub async fn id_token(&self, force_refresh: bool) -> Result<String, ClientError> {
        let Some(user) = self.current_user().await else {
            return Err(AuthError::NoSignedInUser.into());
        };
        let Some(token) = user.id_token.clone() else {
            return Err(AuthError::UserTokenExpired.into());
        };

        let now = chrono::Utc::now().timestamp();
        if !force_refresh && !user.token_needs_refresh(now) {
            return Ok(token);
        }

        let Some(refresh_token) = user.refresh_token.clone() else {
            return Err(AuthError::UserTokenExpired.into());
        };

        let url = format!(
            "{}token?key={}",
            self.inner.config.secure_token_base_url, self.inner.config.api_key
        );
        debug!(uid = %user.uid, "refreshing id token");

        let response = self
            .inner
            .http_client
            .post(&url)
            .json(&serde_json::json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token
            }))
            .send()
            .await?;
        let refreshed: RefreshResponse = match parse_identity_response(response).await {
            Ok(refreshed) => refreshed,
            Err(err) => {
                // A rejected refresh token ends the session
                if err.requires_auth() {
                    self.drop_expired_user(&user.uid).await;
                }
                return Err(err);
            }
        };

        let mut current = self.inner.current_user.write().await;
        // Only store the token if the same user is still signed in
        let same_user = current.as_ref().is_some_and(|u| u.uid == user.uid);
        if same_user {
            let mut updated = User::clone(&user);
            updated.id_token = Some(refreshed.id_token.clone());
            updated.refresh_token = Some(refreshed.refresh_token);
            updated.token_expiration = expiration_from(refreshed.expires_in.as_deref());
            *current = Some(Arc::new(updated));
        }

        Ok(refreshed.id_token)
    }

    async fn drop_expired_user(&self, uid: &str) {
        let mut current = self.inner.current_user.write().await;
        if current.as_ref().is_some_and(|u| u.uid == uid) {
            *current = None;
            let _ = self.inner.state_tx.send(None);
            debug!(uid, "refresh token rejected; signed out");
        }
    }

    async fn post_identity<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, ClientError> {
        let url = format!(
            "{}{}?key={}",
            self.inner.config.identity_base_url, method, self.inner.config.api_key
        );
        debug!(method, "identity toolkit request");

        let response = self.inner.http_client.post(&url).json(&body).send().await?;
        parse_identity_response(response).await
    }

    async fn complete_sign_in(&self, response: SignInResponse, provider_id: &str, is_new_user: bool) -> AuthResult {
        let user = Arc::new(response.into_user());
        self.set_current_user(Some(Arc::clone(&user))).await;
        debug!(uid = %user.uid, provider_id, "signed in");

        AuthResult {
            user,
            additional_user_info: Some(AdditionalUserInfo {
                provider_id: provider_id.to_string(),
                is_new_user,
            }),
        }
    }
}

async fn parse_identity_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    // Handle error responses first
    if !response.status().is_success() {
        let error_body: serde_json::Value = response.json().await.unwrap_or_default();
        let error_message = error_body["error"]["message"]
            .as_str()
            .unwrap_or("UNKNOWN_ERROR");
        return Err(AuthError::from_error_code(error_message).into());
    }

    Ok(response.json().await?)
}

fn expiration_from(expires_in: Option<&str>) -> Option<i64> {
    let now = chrono::Utc::now().timestamp();
    match expires_in {
        // Default: 1 hour expiration
        None => Some(now + 3600),
        Some(seconds) => seconds.parse::<i64>().ok().map(|s| now + s),
    }
}

/// Identity Toolkit sign-in response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    #[serde(alias = "profilePicture")]
    photo_url: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
    is_new_user: Option<bool>,
}

impl SignInResponse {
    fn into_user(self) -> User {
        let token_expiration = expiration_from(self.expires_in.as_deref());
        User {
            uid: self.local_id,
            email: self.email,
            display_name: self.display_name.filter(|name| !name.is_empty()),
            photo_url: self.photo_url.filter(|url| !url.is_empty()),
            id_token: Some(self.id_token),
            refresh_token: Some(self.refresh_token),
            token_expiration,
        }
    }
}

/// Secure Token refresh response
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: Option<String>,
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("api_key", &"<redacted>")
            .field("identity_base_url", &self.inner.config.identity_base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use httpmock::prelude::*;
    use serde_json::json;

    fn mock_auth(server: &MockServer) -> Auth {
        let config = AuthConfig {
            api_key: "test-key".to_string(),
            identity_base_url: server.url("/identity/"),
            secure_token_base_url: server.url("/securetoken/"),
        };
        Auth::new(config, reqwest::Client::new()).unwrap()
    }

    fn signed_in_user(uid: &str) -> Arc<User> {
        let mut user = User::new(uid, Some("test@example.com".to_string()));
        user.id_token = Some("old-token".to_string());
        user.refresh_token = Some("refresh-1".to_string());
        user.token_expiration = Some(chrono::Utc::now().timestamp() + 3600);
        Arc::new(user)
    }

    #[test]
    fn test_new_empty_key_error() {
        let result = Auth::new(AuthConfig::new(""), reqwest::Client::new());
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn test_current_user_initially_none() {
        let auth = Auth::new(AuthConfig::new("key"), reqwest::Client::new()).unwrap();
        assert!(auth.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_sign_in_validates_email() {
        let auth = Auth::new(AuthConfig::new("key"), reqwest::Client::new()).unwrap();
        let result = auth.sign_in_with_email_and_password("", "password").await;
        assert!(matches!(result, Err(ClientError::Auth(AuthError::InvalidEmail))));
    }

    #[tokio::test]
    async fn test_create_user_validates_password() {
        let auth = Auth::new(AuthConfig::new("key"), reqwest::Client::new()).unwrap();
        let result = auth.create_user_with_email_and_password("new@example.com", "").await;
        assert!(matches!(result, Err(ClientError::Auth(AuthError::InvalidPassword))));
    }

    #[tokio::test]
    async fn test_sign_in_with_email_and_password() {
        let server = MockServer::start();
        let auth = mock_auth(&server);

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/identity/accounts:signInWithPassword")
                .query_param("key", "test-key")
                .json_body(json!({
                    "email": "a@b.com",
                    "password": "secret",
                    "returnSecureToken": true
                }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "localId": "uid-123",
                    "email": "a@b.com",
                    "displayName": "",
                    "idToken": "id-token",
                    "refreshToken": "refresh-token",
                    "expiresIn": "3600",
                    "registered": true
                }));
        });

        let result = auth.sign_in_with_email_and_password("a@b.com", "secret").await.unwrap();
        mock.assert();

        assert_eq!(result.user.uid, "uid-123");
        assert_eq!(result.user.email.as_deref(), Some("a@b.com"));
        assert!(result.user.display_name.is_none());
        assert_eq!(result.user.id_token.as_deref(), Some("id-token"));
        assert_eq!(auth.current_user().await.unwrap().uid, "uid-123");
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password_maps_error() {
        let server = MockServer::start();
        let auth = mock_auth(&server);

        server.mock(|when, then| {
            when.method(POST).path("/identity/accounts:signInWithPassword");
            then.status(400)
                .header("content-type", "application/json")
                .json_body(json!({
                    "error": { "code": 400, "message": "INVALID_PASSWORD" }
                }));
        });

        let result = auth.sign_in_with_email_and_password("a@b.com", "wrong").await;
        assert!(matches!(result, Err(ClientError::Auth(AuthError::WrongPassword))));
        assert!(auth.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_create_user_weak_password() {
        let server = MockServer::start();
        let auth = mock_auth(&server);

        server.mock(|when, then| {
            when.method(POST).path("/identity/accounts:signUp");
            then.status(400)
                .header("content-type", "application/json")
                .json_body(json!({
                    "error": {
                        "code": 400,
                        "message": "WEAK_PASSWORD : Password should be at least 6 characters"
                    }
                }));
        });

        let result = auth.create_user_with_email_and_password("a@b.com", "123").await;
        assert!(matches!(result, Err(ClientError::Auth(AuthError::InvalidPassword))));
    }

    #[tokio::test]
    async fn test_create_user_marks_new_user() {
        let server = MockServer::start();
        let auth = mock_auth(&server);

        server.mock(|when, then| {
            when.method(POST).path("/identity/accounts:signUp");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "localId": "uid-new",
                    "email": "new@b.com",
                    "idToken": "id-token",
                    "refreshToken": "refresh-token",
                    "expiresIn": "3600"
                }));
        });

        let result = auth.create_user_with_email_and_password("new@b.com", "secret1").await.unwrap();
        let info = result.additional_user_info.unwrap();
        assert!(info.is_new_user);
        assert_eq!(info.provider_id, "password");
    }

    #[tokio::test]
    async fn test_sign_in_with_google_credential() {
        let server = MockServer::start();
        let auth = mock_auth(&server);

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/identity/accounts:signInWithIdp")
                .json_body(json!({
                    "postBody": "providerId=google.com&id_token=google-token",
                    "requestUri": "http://localhost",
                    "returnSecureToken": true,
                    "returnIdpCredential": true
                }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "localId": "uid-g",
                    "email": "g@gmail.com",
                    "displayName": "Gita",
                    "photoUrl": "https://example.com/g.png",
                    "idToken": "id-token",
                    "refreshToken": "refresh-token",
                    "expiresIn": "3600",
                    "isNewUser": true
                }));
        });

        let result = auth.sign_in_with_credential(Credential::google("google-token")).await.unwrap();
        mock.assert();

        assert_eq!(result.user.display_name.as_deref(), Some("Gita"));
        assert_eq!(result.user.photo_url.as_deref(), Some("https://example.com/g.png"));
        let info = result.additional_user_info.unwrap();
        assert_eq!(info.provider_id, "google.com");
        assert!(info.is_new_user);
    }

    #[tokio::test]
    async fn test_sign_in_with_empty_credential() {
        let auth = Auth::new(AuthConfig::new("key"), reqwest::Client::new()).unwrap();
        let cred = Credential::Google {
            id_token: None,
            access_token: None,
        };
        let result = auth.sign_in_with_credential(cred).await;
        assert!(matches!(result, Err(ClientError::Auth(AuthError::InvalidCredential(_)))));
    }

    #[tokio::test]
    async fn test_id_token_without_user() {
        let auth = Auth::new(AuthConfig::new("key"), reqwest::Client::new()).unwrap();
        let result = auth.id_token(false).await;
        assert!(matches!(result, Err(ClientError::Auth(AuthError::NoSignedInUser))));
    }

    #[tokio::test]
    async fn test_id_token_fresh_is_returned_as_is() {
        let server = MockServer::start();
        let auth = mock_auth(&server);
        auth.set_current_user(Some(signed_in_user("uid-1"))).await;

        let token = auth.id_token(false).await.unwrap();
        assert_eq!(token, "old-token");
    }

    #[tokio::test]
    async fn test_id_token_force_refresh_updates_user() {
        let server = MockServer::start();
        let auth = mock_auth(&server);
        auth.set_current_user(Some(signed_in_user("uid-1"))).await;

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/securetoken/token")
                .query_param("key", "test-key")
                .json_body(json!({
                    "grant_type": "refresh_token",
                    "refresh_token": "refresh-1"
                }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "id_token": "new-token",
                    "refresh_token": "refresh-2",
                    "expires_in": "3600",
                    "user_id": "uid-1"
                }));
        });

        let token = auth.id_token(true).await.unwrap();
        mock.assert();
        assert_eq!(token, "new-token");

        let user = auth.current_user().await.unwrap();
        assert_eq!(user.id_token.as_deref(), Some("new-token"));
        assert_eq!(user.refresh_token.as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn test_id_token_rejected_refresh_signs_out() {
        let server = MockServer::start();
        let auth = mock_auth(&server);
        auth.set_current_user(Some(signed_in_user("uid-1"))).await;
        let mut changes = auth.auth_state_changes().await;
        assert!(changes.next().await.unwrap().is_some());

        let mock = server.mock(|when, then| {
            when.method(POST).path("/securetoken/token");
            then.status(400)
                .header("content-type", "application/json")
                .json_body(json!({
                    "error": { "code": 400, "message": "TOKEN_EXPIRED" }
                }));
        });

        let result = auth.id_token(true).await;
        mock.assert();
        assert!(matches!(result, Err(ClientError::Auth(AuthError::UserTokenExpired))));
        assert!(auth.current_user().await.is_none());
        assert_eq!(changes.next().await, Some(None));
    }

    #[tokio::test]
    async fn test_id_token_transient_refresh_failure_keeps_user() {
        let server = MockServer::start();
        let auth = mock_auth(&server);
        auth.set_current_user(Some(signed_in_user("uid-1"))).await;

        server.mock(|when, then| {
            when.method(POST).path("/securetoken/token");
            then.status(400)
                .header("content-type", "application/json")
                .json_body(json!({
                    "error": { "code": 400, "message": "TOO_MANY_ATTEMPTS_TRY_LATER" }
                }));
        });

        let result = auth.id_token(true).await;
        assert!(matches!(result, Err(ClientError::Auth(AuthError::TooManyRequests))));
        assert!(auth.current_user().await.is_some());
    }

    #[tokio::test]
    async fn test_sign_out_clears_user() {
        let auth = Auth::new(AuthConfig::new("key"), reqwest::Client::new()).unwrap();
        auth.set_current_user(Some(signed_in_user("uid-1"))).await;
        assert!(auth.current_user().await.is_some());

        auth.sign_out().await.unwrap();
        assert!(auth.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_auth_state_changes_initial() {
        let auth = Auth::new(AuthConfig::new("key"), reqwest::Client::new()).unwrap();
        let mut stream = auth.auth_state_changes().await;

        let initial = stream.next().await;
        assert!(initial.is_some());
        assert!(initial.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_auth_state_changes_on_sign_in_and_out() {
        let auth = Auth::new(AuthConfig::new("key"), reqwest::Client::new()).unwrap();
        let mut stream = auth.auth_state_changes().await;
        let _ = stream.next().await;

        auth.set_current_user(Some(signed_in_user("uid-9"))).await;
        let next = stream.next().await.unwrap();
        assert_eq!(next.unwrap().uid, "uid-9");

        auth.sign_out().await.unwrap();
        let next = stream.next().await.unwrap();
        assert!(next.is_none());
    }
}
