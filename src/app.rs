//! Client app
//!
//! Holds the configuration and wires the identity client, the hospital API
//! and the state holders together. One `App` carries one session.

use crate::api::client::{normalize_base_url, DEFAULT_PAGE_SIZE};
use crate::api::HospitalApi;
use crate::appointments::{AppointmentBook, AppointmentPages};
use crate::auth::auth::{DEFAULT_IDENTITY_BASE_URL, DEFAULT_SECURE_TOKEN_BASE_URL};
use crate::auth::{Auth, AuthConfig, IdentityProvider, TokenSource};
use crate::doctors::{DoctorDirectory, DoctorPages};
use crate::error::ClientError;
use crate::session::Session;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default transport timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client configuration
#[derive(Clone, Debug)]
pub struct AppOptions {
    /// Hospital backend base URL
    pub api_base_url: String,
    /// Firebase web API key
    pub api_key: String,
    /// Identity Toolkit base URL
    pub identity_base_url: String,
    /// Secure Token base URL
    pub secure_token_base_url: String,
    /// Transport timeout for every request
    pub request_timeout: Duration,
    /// Items per page for list views
    pub page_size: u32,
}

impl AppOptions {
    /// Options with default endpoints, a 30 s timeout and 20 items per page
    pub fn new(api_base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            api_key: api_key.into(),
            identity_base_url: DEFAULT_IDENTITY_BASE_URL.to_string(),
            secure_token_base_url: DEFAULT_SECURE_TOKEN_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Read options from the environment
    ///
    /// Required: `API_BASE_URL`, `FIREBASE_API_KEY`. Optional:
    /// `REQUEST_TIMEOUT_SECS`, `PAGE_SIZE`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let required = |key: &str| {
            var(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ClientError::config(format!("{} must be set", key)))
        };
        let number = |key: &str| -> Result<Option<u64>, ClientError> {
            match var(key).filter(|v| !v.trim().is_empty()) {
                None => Ok(None),
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| ClientError::config(format!("{} must be a positive integer, got {:?}", key, raw))),
            }
        };

        let mut options = Self::new(required("API_BASE_URL")?, required("FIREBASE_API_KEY")?);
        if let Some(secs) = number("REQUEST_TIMEOUT_SECS")? {
            options.request_timeout = Duration::from_secs(secs);
        }
        if let Some(size) = number("PAGE_SIZE")? {
            options.page_size = u32::try_from(size).map_err(|_| ClientError::config("PAGE_SIZE is too large"))?;
        }
        Ok(options)
    }

    /// Check the options without building anything
    pub fn validate(&self) -> Result<(), ClientError> {
        // Validate options (error case first)
        if self.api_key.trim().is_empty() {
            return Err(ClientError::config("Firebase API key not configured"));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(ClientError::config("API base URL not configured"));
        }
        if self.page_size == 0 {
            return Err(ClientError::config("Page size must be at least 1"));
        }
        if self.request_timeout.is_zero() {
            return Err(ClientError::config("Request timeout must be non-zero"));
        }
        Ok(())
    }
}

/// Wired client
///
/// Cheap to clone; clones share the session and every list.
///
/// # Example
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use swaasthya_client::{App, AppOptions};
///
/// let app = App::new(AppOptions::from_env()?)?;
/// app.session().restore().await;
/// app.doctors().list().load(1, None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

struct AppInner {
    options: AppOptions,
    auth: Auth,
    api: HospitalApi,
    session: Session,
    doctors: DoctorDirectory,
    appointments: AppointmentBook,
}

impl App {
    /// Validate `options` and build every component
    pub fn new(options: AppOptions) -> Result<Self, ClientError> {
        options.validate()?;

        let http_client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()?;

        let auth = Auth::new(
            AuthConfig {
                api_key: options.api_key.clone(),
                identity_base_url: normalize_base_url(&options.identity_base_url)?,
                secure_token_base_url: normalize_base_url(&options.secure_token_base_url)?,
            },
            http_client.clone(),
        )?;

        let tokens: Arc<dyn TokenSource> = Arc::new(auth.clone());
        let api = HospitalApi::new(options.api_base_url.as_str(), http_client, Some(tokens))?;

        let provider: Arc<dyn IdentityProvider> = Arc::new(auth.clone());
        let session = Session::new(provider);
        let doctors = DoctorDirectory::new(
            Arc::new(DoctorPages::new(api.clone())),
            Arc::new(api.clone()),
            options.page_size,
        );
        let appointments = AppointmentBook::new(Arc::new(AppointmentPages::new(api.clone())), options.page_size);

        debug!(base_url = api.base_url(), page_size = options.page_size, "app created");

        Ok(App {
            inner: Arc::new(AppInner {
                options,
                auth,
                api,
                session,
                doctors,
                appointments,
            }),
        })
    }

    /// Get the app options
    pub fn options(&self) -> &AppOptions {
        &self.inner.options
    }

    /// Identity client
    pub fn auth(&self) -> &Auth {
        &self.inner.auth
    }

    /// Hospital API client
    pub fn api(&self) -> &HospitalApi {
        &self.inner.api
    }

    /// Session state holder
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Doctor list and search
    pub fn doctors(&self) -> &DoctorDirectory {
        &self.inner.doctors
    }

    /// The user's appointments
    pub fn appointments(&self) -> &AppointmentBook {
        &self.inner.appointments
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("api", &self.inner.api)
            .field("auth", &self.inner.auth)
            .finish()
    }
}
