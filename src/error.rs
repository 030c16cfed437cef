//! Client error types
//!
//! Provides a unified error type hierarchy for identity, hospital API and
//! configuration failures.
//!
//! # Design
//! Uses thiserror for ergonomic error definitions. All errors implement
//! std::error::Error and can be converted to ClientError via From trait.
//!
//! State holders never surface these values directly: they turn them into a
//! display string with [`ClientError::user_message`].

use thiserror::Error;

/// Top-level client error type
///
/// Wraps specific error types (Auth, Api) into a unified type.
/// Supports conversion from all module-specific errors via `From` trait.
///
/// # Example
/// ```
/// use swaasthya_client::{ClientError, AuthError};
///
/// let auth_err: ClientError = AuthError::InvalidEmail.into();
/// ```
#[derive(Debug, Error)]
pub enum ClientError {
    /// Identity provider errors
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Hospital backend errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Network/HTTP errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Authentication errors
///
/// Maps Identity Toolkit REST error codes to Rust enum variants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Email address is invalid
    #[error("Invalid email address")]
    InvalidEmail,

    /// Password is missing or too weak
    #[error("Invalid password")]
    InvalidPassword,

    /// Email already in use by another account
    #[error("Email already in use")]
    EmailAlreadyInUse,

    /// User not found
    #[error("User not found")]
    UserNotFound,

    /// Wrong password
    #[error("Wrong password")]
    WrongPassword,

    /// Email/password pair rejected without saying which part is wrong
    #[error("Invalid email or password")]
    InvalidLoginCredentials,

    /// User account has been disabled
    #[error("User account disabled")]
    UserDisabled,

    /// Too many failed login attempts
    #[error("Too many requests, try again later")]
    TooManyRequests,

    /// Operation not allowed (e.g., provider disabled)
    #[error("Operation not allowed")]
    OperationNotAllowed,

    /// Invalid credential
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// User token has expired
    #[error("User token expired")]
    UserTokenExpired,

    /// Invalid user token
    #[error("Invalid user token")]
    InvalidUserToken,

    /// No signed-in user
    #[error("No user is currently signed in")]
    NoSignedInUser,

    /// Invalid API key
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Account exists with different credential
    #[error("Account exists with different credential")]
    AccountExistsWithDifferentCredential,

    /// Unknown error with the raw provider code
    #[error("Unknown auth error: {0}")]
    Unknown(String),
}

/// Hospital backend errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The response envelope reported failure
    #[error("{message} (status {status})")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Envelope `error` field or the operation's fallback message
        message: String,
    },

    /// Envelope reported success but carried no `data`
    #[error("Response contained no data")]
    EmptyPayload,

    /// Request rejected before it was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Create a configuration error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if error indicates the session is no longer valid
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::NoSignedInUser)
                | Self::Auth(AuthError::UserTokenExpired)
                | Self::Auth(AuthError::InvalidUserToken)
                | Self::Api(ApiError::Rejected { status: 401, .. })
        )
    }

    /// Human-readable message for an `Error` state
    ///
    /// Backend and provider messages are passed through; transport, decoding
    /// and configuration failures collapse to `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        let message = match self {
            Self::Api(ApiError::Rejected { message, .. }) => message.clone(),
            Self::Api(ApiError::InvalidRequest(reason)) => reason.clone(),
            Self::Auth(err) => err.to_string(),
            _ => String::new(),
        };
        if message.trim().is_empty() {
            return fallback.to_string();
        }
        message
    }
}

impl AuthError {
    /// Create from Identity Toolkit REST API error code
    ///
    /// Codes may carry a detail suffix (`"WEAK_PASSWORD : Password should be
    /// at least 6 characters"`); only the part before `" : "` is matched.
    pub fn from_error_code(code: &str) -> Self {
        let code = code.split(" : ").next().unwrap_or(code).trim();
        match code {
            "EMAIL_NOT_FOUND" => Self::UserNotFound,
            "INVALID_PASSWORD" => Self::WrongPassword,
            "INVALID_LOGIN_CREDENTIALS" => Self::InvalidLoginCredentials,
            "USER_DISABLED" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyRequests,
            "EMAIL_EXISTS" => Self::EmailAlreadyInUse,
            "OPERATION_NOT_ALLOWED" => Self::OperationNotAllowed,
            "INVALID_EMAIL" => Self::InvalidEmail,
            "WEAK_PASSWORD" | "MISSING_PASSWORD" => Self::InvalidPassword,
            "INVALID_ID_TOKEN" => Self::InvalidUserToken,
            "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" => Self::UserTokenExpired,
            "INVALID_API_KEY" => Self::InvalidApiKey,
            "INVALID_IDP_RESPONSE" => Self::InvalidCredential("Identity provider rejected the token".to_string()),
            "FEDERATED_USER_ID_ALREADY_LINKED" | "EMAIL_EXISTS_WITH_DIFFERENT_CREDENTIAL" => {
                Self::AccountExistsWithDifferentCredential
            }
            other => Self::Unknown(other.to_string()),
        }
    }
}
