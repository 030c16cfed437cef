//! Hospital backend REST client
//!
//! One method per backend endpoint. Mobile endpoints reply with the
//! `{success, message, data, error}` envelope; this client unwraps it and
//! turns failures into [`ApiError::Rejected`] carrying the envelope's `error`
//! text or a per-operation fallback.

use crate::api::types::{
    ApiResponse, Appointment, AppointmentResponse, CreateAppointmentRequest, CreateAppointmentResponse, Doctor,
    DoctorResponse, HealthStatus, Page, SearchDoctorsResponse, UpdateAppointmentRequest,
};
use crate::auth::TokenSource;
use crate::error::{ApiError, ClientError};
use reqwest::{header, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Page size the backend uses when none is given
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Hospital backend client
///
/// Cheap to clone. Every request carries `Authorization: Bearer <token>` when
/// the token source has a session.
#[derive(Clone)]
pub struct HospitalApi {
    inner: Arc<ApiInner>,
}

struct ApiInner {
    base_url: String,
    http_client: reqwest::Client,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl HospitalApi {
    /// Create a client for the backend at `base_url`
    ///
    /// # Example
    /// ```no_run
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// use swaasthya_client::api::HospitalApi;
    ///
    /// let api = HospitalApi::new("http://localhost:8080", reqwest::Client::new(), None)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        base_url: impl Into<String>,
        http_client: reqwest::Client,
        tokens: Option<Arc<dyn TokenSource>>,
    ) -> Result<Self, ClientError> {
        let base_url = normalize_base_url(&base_url.into())?;
        Ok(Self {
            inner: Arc::new(ApiInner {
                base_url,
                http_client,
                tokens,
            }),
        })
    }

    /// Base URL requests are resolved against (always ends with `/`)
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// List doctors, optionally filtered by specialization
    pub async fn list_doctors(
        &self,
        page: u32,
        limit: u32,
        specialization: Option<&str>,
    ) -> Result<Page<Doctor>, ClientError> {
        let mut query = vec![("page", page.to_string()), ("limit", limit.to_string())];
        if let Some(specialization) = non_blank(specialization) {
            query.push(("specialization", specialization.to_string()));
        }

        let request = self.request(Method::GET, "api/mobile/doctors").await.query(&query);
        let envelope: ApiResponse<DoctorResponse> = self.send(request, "Failed to fetch doctors").await?;
        Ok(require_data(envelope)?.into())
    }

    /// Free-text and/or specialization search
    pub async fn search_doctors(
        &self,
        query: Option<&str>,
        specialization: Option<&str>,
    ) -> Result<SearchDoctorsResponse, ClientError> {
        let mut params = Vec::new();
        if let Some(q) = non_blank(query) {
            params.push(("q", q.to_string()));
        }
        if let Some(specialization) = non_blank(specialization) {
            params.push(("specialization", specialization.to_string()));
        }

        let request = self.request(Method::GET, "api/mobile/search/doctors").await.query(&params);
        let envelope = self.send(request, "Failed to search doctors").await?;
        require_data(envelope)
    }

    /// Fetch a single doctor
    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, ClientError> {
        let path = format!("api/doctors/{}", doctor_id);
        let request = self.request(Method::GET, &path).await;
        let envelope = self.send(request, "Failed to fetch doctor").await?;
        require_data(envelope)
    }

    /// Book an appointment for the signed-in user
    pub async fn create_appointment(
        &self,
        request: &CreateAppointmentRequest,
    ) -> Result<CreateAppointmentResponse, ClientError> {
        let builder = self.request(Method::POST, "api/mobile/appointments").await.json(request);
        let envelope = self.send(builder, "Failed to create appointment").await?;
        require_data(envelope)
    }

    /// List the signed-in user's appointments
    pub async fn list_appointments(&self, page: u32, limit: u32) -> Result<Page<Appointment>, ClientError> {
        let query = [("page", page.to_string()), ("limit", limit.to_string())];
        let request = self.request(Method::GET, "api/mobile/appointments").await.query(&query);
        let envelope: ApiResponse<AppointmentResponse> = self.send(request, "Failed to fetch appointments").await?;
        Ok(require_data(envelope)?.into())
    }

    /// Apply a partial update
    ///
    /// Returns the updated appointment when the backend echoes it; the legacy
    /// endpoint only acknowledges with a message.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        patch: &UpdateAppointmentRequest,
    ) -> Result<Option<Appointment>, ClientError> {
        // Error-first: nothing to send
        if patch.is_empty() {
            return Err(ApiError::InvalidRequest("Update must change at least one field".to_string()).into());
        }

        let path = format!("api/appointments/{}", appointment_id);
        let request = self.request(Method::PUT, &path).await.json(patch);
        let envelope: ApiResponse<Appointment> = self.send(request, "Failed to update appointment").await?;
        Ok(envelope.data)
    }

    /// Cancel an appointment
    pub async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<(), ClientError> {
        let path = format!("api/appointments/{}", appointment_id);
        let request = self.request(Method::DELETE, &path).await;
        let _: ApiResponse<serde_json::Value> = self.send(request, "Failed to cancel appointment").await?;
        Ok(())
    }

    /// Backend liveness probe (not enveloped)
    pub async fn health_check(&self) -> Result<HealthStatus, ClientError> {
        let response = self.request(Method::GET, "health").await.send().await?;
        let status = response.status();

        // Handle error responses first
        if !status.is_success() {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: "Health check failed".to_string(),
            }
            .into());
        }

        Ok(response.json().await?)
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.inner.base_url, path);
        debug!(method = method.as_str(), path, "hospital api request");

        let builder = self.inner.http_client.request(method, url);
        match self.bearer_token().await {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    async fn bearer_token(&self) -> Option<String> {
        let tokens = self.inner.tokens.as_ref()?;
        match tokens.bearer_token().await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "could not obtain bearer token; sending request without it");
                None
            }
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        fallback: &str,
    ) -> Result<ApiResponse<T>, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        let envelope: ApiResponse<T> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(err) if status.is_success() => return Err(err.into()),
            Err(_) => {
                return Err(ApiError::Rejected {
                    status: status.as_u16(),
                    message: fallback.to_string(),
                }
                .into())
            }
        };

        if !envelope.is_success(status.is_success()) {
            let message = envelope
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string());
            debug!(status = status.as_u16(), %message, "hospital api rejected request");
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        Ok(envelope)
    }
}

impl std::fmt::Debug for HospitalApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HospitalApi")
            .field("base_url", &self.inner.base_url)
            .field("authenticated", &self.inner.tokens.is_some())
            .finish()
    }
}

fn require_data<T>(envelope: ApiResponse<T>) -> Result<T, ClientError> {
    envelope.data.ok_or_else(|| ApiError::EmptyPayload.into())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validate a base URL and make sure it ends with `/`
pub(crate) fn normalize_base_url(raw: &str) -> Result<String, ClientError> {
    let trimmed = raw.trim();

    // Error-first: empty or non-HTTP base URL
    if trimmed.is_empty() {
        return Err(ClientError::config("Base URL cannot be empty"));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(ClientError::config(format!("Base URL must be http(s): {}", trimmed)));
    }

    if trimmed.ends_with('/') {
        return Ok(trimmed.to_string());
    }
    Ok(format!("{}/", trimmed))
}
