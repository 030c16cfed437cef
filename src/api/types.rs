//! Hospital API wire types
//!
//! Field names follow the backend's snake_case JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Response envelope shared by the mobile endpoints
///
/// `success` is optional because the older endpoints (`api/doctors/{id}`,
/// `api/appointments/{id}`) reply without it.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    /// Outcome flag
    #[serde(default)]
    pub success: Option<bool>,
    /// Human-readable status message
    #[serde(default)]
    pub message: Option<String>,
    /// Payload
    #[serde(alias = "doctor")]
    pub data: Option<T>,
    /// Failure reason
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Whether the call succeeded given the HTTP status it arrived with
    ///
    /// Without a `success` flag, a 2xx status with no `error` counts.
    pub fn is_success(&self, http_ok: bool) -> bool {
        http_ok && self.success.unwrap_or(self.error.is_none())
    }
}

/// Pagination envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInfo {
    /// 1-based page number
    pub page: u32,
    /// Page size requested
    pub limit: u32,
    /// Total item count
    pub total: u32,
    /// Total page count
    pub total_pages: u32,
    /// More pages after this one
    pub has_next: bool,
    /// Pages before this one
    pub has_prev: bool,
}

impl PaginationInfo {
    /// Build pagination for a page window, deriving the flags
    pub fn new(page: u32, limit: u32, total: u32) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// One page of items plus its pagination envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items in backend order
    pub items: Vec<T>,
    /// Window metadata
    pub pagination: PaginationInfo,
}

/// Backend user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiUser {
    /// Backend user ID
    pub id: Uuid,
    /// Firebase UID the profile belongs to
    #[serde(default)]
    pub firebase_uid: String,
    /// Full name
    #[serde(default)]
    pub name: String,
    /// Email address
    #[serde(default)]
    pub email: String,
    /// Role ("patient", "doctor", "admin")
    #[serde(default)]
    pub role: String,
    /// Creation time
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Doctor listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    /// Doctor ID
    pub id: Uuid,
    /// Owning user ID
    pub user_id: Uuid,
    /// Medical specialization
    pub specialization: String,
    /// Years of experience
    pub experience: u32,
    /// Contact phone
    pub phone: String,
    /// Day label → ordered time slots
    #[serde(default)]
    pub available_slots: BTreeMap<String, Vec<String>>,
    /// Creation time
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Owning user profile
    #[serde(default)]
    pub user: Option<ApiUser>,
}

impl Doctor {
    /// Doctor's display name, if the profile was included
    pub fn name(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.name.as_str()).filter(|n| !n.is_empty())
    }

    /// Slots offered on `day`, in backend order
    pub fn slots_for(&self, day: &str) -> &[String] {
        self.available_slots.get(day).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// `data` of `GET api/mobile/doctors`
#[derive(Debug, Clone, Deserialize)]
pub struct DoctorResponse {
    /// Doctors on this page
    #[serde(default, deserialize_with = "null_as_empty")]
    pub doctors: Vec<Doctor>,
    /// Window metadata
    pub pagination: PaginationInfo,
}

impl From<DoctorResponse> for Page<Doctor> {
    fn from(response: DoctorResponse) -> Self {
        Page {
            items: response.doctors,
            pagination: response.pagination,
        }
    }
}

/// `data` of `GET api/mobile/search/doctors`
#[derive(Debug, Clone, Deserialize)]
pub struct SearchDoctorsResponse {
    /// Matches, capped by the backend
    #[serde(default, deserialize_with = "null_as_empty")]
    pub doctors: Vec<Doctor>,
    /// Echoed query
    #[serde(default)]
    pub query: Option<String>,
    /// Echoed specialization filter
    #[serde(default)]
    pub specialization: Option<String>,
}

/// Appointment status as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    /// Newly booked
    Scheduled,
    /// Confirmed by the clinic
    Confirmed,
    /// Visit took place
    Completed,
    /// Cancelled by patient or clinic
    Cancelled,
    /// Any status this client does not know about
    Other(String),
}

impl AppointmentStatus {
    /// Wire representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Other(raw) => raw,
        }
    }
}

impl From<&str> for AppointmentStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "scheduled" => Self::Scheduled,
            "confirmed" => Self::Confirmed,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AppointmentStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AppointmentStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

/// Booked appointment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    /// Appointment ID
    pub id: Uuid,
    /// Doctor ID
    pub doctor_id: Uuid,
    /// Patient (backend user) ID
    pub patient_id: Uuid,
    /// Appointment date and time
    pub appointment_date: DateTime<Utc>,
    /// Booked slot label
    pub slot: String,
    /// Backend-owned status
    pub status: AppointmentStatus,
    /// Patient notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Creation time
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Doctor details, when joined by the backend
    #[serde(default)]
    pub doctor: Option<Doctor>,
}

/// `data` of `GET api/mobile/appointments`
#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentResponse {
    /// Appointments on this page
    #[serde(default, deserialize_with = "null_as_empty")]
    pub appointments: Vec<Appointment>,
    /// Window metadata
    pub pagination: PaginationInfo,
}

impl From<AppointmentResponse> for Page<Appointment> {
    fn from(response: AppointmentResponse) -> Self {
        Page {
            items: response.appointments,
            pagination: response.pagination,
        }
    }
}

/// Body of `POST api/mobile/appointments`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateAppointmentRequest {
    /// Doctor to book
    pub doctor_id: Uuid,
    /// RFC 3339 UTC timestamp (`YYYY-MM-DDTHH:MM:SSZ`)
    pub appointment_date: String,
    /// Slot label from the doctor's availability
    pub slot: String,
    /// Optional patient notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CreateAppointmentRequest {
    /// Build a request for `date`, formatted the way the backend parses it
    pub fn new(doctor_id: Uuid, date: DateTime<Utc>, slot: impl Into<String>) -> Self {
        Self {
            doctor_id,
            appointment_date: format_appointment_date(date),
            slot: slot.into(),
            notes: None,
        }
    }

    /// Attach notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// `data` of a successful booking
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateAppointmentResponse {
    /// New appointment ID
    pub appointment_id: Uuid,
    /// Booked date (`YYYY-MM-DD`)
    pub appointment_date: String,
    /// Booked time (`HH:MM`)
    pub appointment_time: String,
    /// Booked slot label
    pub slot: String,
}

/// Partial update for `PUT api/appointments/{id}`; unset fields are omitted
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateAppointmentRequest {
    /// New RFC 3339 date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_date: Option<String>,
    /// New slot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    /// New status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    /// New notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl UpdateAppointmentRequest {
    /// Move the appointment to a new date and slot
    pub fn reschedule(date: DateTime<Utc>, slot: impl Into<String>) -> Self {
        Self {
            appointment_date: Some(format_appointment_date(date)),
            slot: Some(slot.into()),
            ..Default::default()
        }
    }

    /// Replace the notes
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Set the status
    pub fn status(mut self, status: AppointmentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// True when no field would be sent
    pub fn is_empty(&self) -> bool {
        self.appointment_date.is_none() && self.slot.is_none() && self.status.is_none() && self.notes.is_none()
    }
}

/// `GET /health` body
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    /// "ok" when the backend is up
    pub status: String,
    /// Free-form detail
    #[serde(default)]
    pub message: Option<String>,
}

/// Format a timestamp the way the backend's date parser expects
pub fn format_appointment_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
