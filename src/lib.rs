//! Swaasthya client
//!
//! Async client for the Swaasthya hospital booking backend: Firebase
//! identity sessions, paginated doctor and appointment lists, and doctor
//! search.
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use swaasthya_client::{App, AppOptions, SessionState};
//!
//! let app = App::new(AppOptions::new("https://api.example.com", "YOUR_API_KEY"))?;
//! app.session().sign_in("user@example.com", "password").await?;
//! if let SessionState::Authenticated(user) = app.session().state() {
//!     println!("Signed in: {}", user.uid);
//! }
//!
//! let doctors = app.doctors().list();
//! doctors.load(1, None).await?;
//! while doctors.load_more().await? {}
//! println!("{} doctors", doctors.state().items().len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod app;
pub mod appointments;
pub mod doctors;
pub mod error;
pub mod listing;
pub mod session;

// Identity provider
pub mod auth {
    //! Firebase Authentication

    pub mod auth;
    pub mod provider;
    pub mod types;

    pub use auth::{Auth, AuthConfig};
    pub use provider::{IdentityProvider, TokenSource};
    pub use types::{AdditionalUserInfo, AuthResult, Credential, User};
}

// Hospital backend
pub mod api {
    //! Hospital REST API

    pub mod client;
    pub mod types;

    pub use client::{HospitalApi, DEFAULT_PAGE_SIZE};
}

// Re-exports for convenience
pub use app::{App, AppOptions};
pub use appointments::{AppointmentBook, AppointmentPages, AppointmentStore};
pub use doctors::{DoctorDirectory, DoctorPages, DoctorSearch, SearchState};
pub use error::{ApiError, AuthError, ClientError};
pub use listing::{ListState, PageSource, PagedList};
pub use session::{Session, SessionState};

pub use api::types::{
    Appointment, AppointmentStatus, CreateAppointmentRequest, Doctor, Page, PaginationInfo,
    UpdateAppointmentRequest,
};
pub use auth::{Auth, User};
