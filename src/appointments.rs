//! Appointment book
//!
//! The signed-in user's appointments as a paginated list, with booking,
//! rescheduling and cancellation. Every successful change reloads the list
//! from page 1.

use crate::api::types::{
    Appointment, CreateAppointmentRequest, CreateAppointmentResponse, Page, UpdateAppointmentRequest,
};
use crate::api::HospitalApi;
use crate::error::{ApiError, ClientError};
use crate::listing::{ListState, PageSource, PagedList};
use async_trait::async_trait;
use chrono::DateTime;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Appointment backend
#[async_trait]
pub trait AppointmentStore: PageSource<Item = Appointment> {
    /// Book an appointment
    async fn create(&self, request: &CreateAppointmentRequest) -> Result<CreateAppointmentResponse, ClientError>;

    /// Apply a partial update
    async fn update(&self, id: Uuid, patch: &UpdateAppointmentRequest) -> Result<Option<Appointment>, ClientError>;

    /// Cancel an appointment
    async fn cancel(&self, id: Uuid) -> Result<(), ClientError>;
}

/// Appointment pages and mutations over the hospital API
#[derive(Debug, Clone)]
pub struct AppointmentPages {
    api: HospitalApi,
}

impl AppointmentPages {
    /// Appointment store over the hospital API
    pub fn new(api: HospitalApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PageSource for AppointmentPages {
    type Item = Appointment;

    async fn fetch_page(&self, page: u32, limit: u32, _filter: Option<&str>) -> Result<Page<Appointment>, ClientError> {
        self.api.list_appointments(page, limit).await
    }
}

#[async_trait]
impl AppointmentStore for AppointmentPages {
    async fn create(&self, request: &CreateAppointmentRequest) -> Result<CreateAppointmentResponse, ClientError> {
        self.api.create_appointment(request).await
    }

    async fn update(&self, id: Uuid, patch: &UpdateAppointmentRequest) -> Result<Option<Appointment>, ClientError> {
        self.api.update_appointment(id, patch).await
    }

    async fn cancel(&self, id: Uuid) -> Result<(), ClientError> {
        self.api.cancel_appointment(id).await
    }
}

/// Paginated appointment list with booking operations
pub struct AppointmentBook<S: AppointmentStore = AppointmentPages> {
    store: Arc<S>,
    list: PagedList<S>,
}

impl<S: AppointmentStore> Clone for AppointmentBook<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            list: self.list.clone(),
        }
    }
}

impl<S: AppointmentStore> AppointmentBook<S> {
    /// Create a book with its list in `Loading`
    pub fn new(store: Arc<S>, page_size: u32) -> Self {
        let list = PagedList::new(Arc::clone(&store), "appointments", page_size);
        Self { store, list }
    }

    /// The paginated appointment list
    pub fn list(&self) -> &PagedList<S> {
        &self.list
    }

    /// Current list state
    pub fn state(&self) -> ListState<Appointment> {
        self.list.state()
    }

    /// Book an appointment and reload the list
    pub async fn book(&self, request: &CreateAppointmentRequest) -> Result<CreateAppointmentResponse, ClientError> {
        // Validate slot (error case first)
        if request.slot.trim().is_empty() {
            return Err(invalid("Appointment slot must not be empty"));
        }
        validate_date(&request.appointment_date)?;

        let booked = self.store.create(request).await?;
        debug!(appointment_id = %booked.appointment_id, slot = %booked.slot, "appointment booked");
        self.reload().await;
        Ok(booked)
    }

    /// Update an appointment and reload the list
    pub async fn update(
        &self,
        id: Uuid,
        patch: &UpdateAppointmentRequest,
    ) -> Result<Option<Appointment>, ClientError> {
        if patch.is_empty() {
            return Err(invalid("Update must change at least one field"));
        }
        if patch.slot.as_deref().is_some_and(|slot| slot.trim().is_empty()) {
            return Err(invalid("Appointment slot must not be empty"));
        }
        if let Some(date) = patch.appointment_date.as_deref() {
            validate_date(date)?;
        }

        let updated = self.store.update(id, patch).await?;
        debug!(appointment_id = %id, "appointment updated");
        self.reload().await;
        Ok(updated)
    }

    /// Cancel an appointment and reload the list
    pub async fn cancel(&self, id: Uuid) -> Result<(), ClientError> {
        self.store.cancel(id).await?;
        debug!(appointment_id = %id, "appointment cancelled");
        self.reload().await;
        Ok(())
    }

    async fn reload(&self) {
        // The change itself succeeded; a failed reload shows up in the list state
        if let Err(err) = self.list.refresh().await {
            warn!(error = %err, "could not reload appointments");
        }
    }
}

impl<S: AppointmentStore> std::fmt::Debug for AppointmentBook<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppointmentBook").field("list", &self.list).finish()
    }
}

fn validate_date(date: &str) -> Result<(), ClientError> {
    DateTime::parse_from_rfc3339(date)
        .map(|_| ())
        .map_err(|_| invalid(&format!("Invalid appointment date: {}", date)))
}

fn invalid(reason: &str) -> ClientError {
    ApiError::InvalidRequest(reason.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{AppointmentStatus, PaginationInfo};
    use chrono::{TimeZone, Utc};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn appointment(id: Uuid, status: AppointmentStatus) -> Appointment {
        Appointment {
            id,
            doctor_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            appointment_date: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
            slot: "09:00".to_string(),
            status,
            notes: None,
            created_at: None,
            updated_at: None,
            doctor: None,
        }
    }

    /// In-memory appointment store
    #[derive(Default)]
    struct FakeStore {
        booked: Mutex<Vec<Appointment>>,
        fetches: Mutex<u32>,
        reject_create: bool,
    }

    #[async_trait]
    impl PageSource for FakeStore {
        type Item = Appointment;

        async fn fetch_page(&self, page: u32, limit: u32, _filter: Option<&str>) -> Result<Page<Appointment>, ClientError> {
            *self.fetches.lock().unwrap() += 1;
            let booked = self.booked.lock().unwrap();
            let start = ((page - 1) * limit) as usize;
            let items: Vec<_> = booked.iter().skip(start).take(limit as usize).cloned().collect();
            Ok(Page {
                items,
                pagination: PaginationInfo::new(page, limit, booked.len() as u32),
            })
        }
    }

    #[async_trait]
    impl AppointmentStore for FakeStore {
        async fn create(&self, request: &CreateAppointmentRequest) -> Result<CreateAppointmentResponse, ClientError> {
            if self.reject_create {
                return Err(ApiError::Rejected {
                    status: 409,
                    message: "Slot already booked".to_string(),
                }
                .into());
            }
            let id = Uuid::new_v4();
            self.booked
                .lock()
                .unwrap()
                .push(appointment(id, AppointmentStatus::Scheduled));
            Ok(CreateAppointmentResponse {
                appointment_id: id,
                appointment_date: request.appointment_date.clone(),
                appointment_time: request.slot.clone(),
                slot: request.slot.clone(),
            })
        }

        async fn update(&self, id: Uuid, patch: &UpdateAppointmentRequest) -> Result<Option<Appointment>, ClientError> {
            let mut booked = self.booked.lock().unwrap();
            let found = booked.iter_mut().find(|a| a.id == id);
            let Some(found) = found else {
                return Err(ApiError::Rejected {
                    status: 404,
                    message: "Appointment not found".to_string(),
                }
                .into());
            };
            if let Some(status) = &patch.status {
                found.status = status.clone();
            }
            Ok(Some(found.clone()))
        }

        async fn cancel(&self, id: Uuid) -> Result<(), ClientError> {
            let mut booked = self.booked.lock().unwrap();
            for a in booked.iter_mut().filter(|a| a.id == id) {
                a.status = AppointmentStatus::Cancelled;
            }
            Ok(())
        }
    }

    fn book(store: FakeStore) -> (AppointmentBook<FakeStore>, Arc<FakeStore>) {
        let store = Arc::new(store);
        (AppointmentBook::new(store.clone(), 20), store)
    }

    fn request() -> CreateAppointmentRequest {
        CreateAppointmentRequest::new(Uuid::new_v4(), Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(), "09:00")
    }

    #[tokio::test]
    async fn test_book_refreshes_list() {
        let (book, store) = book(FakeStore::default());
        book.list().load(1, None).await.unwrap();
        assert!(book.state().items().is_empty());

        let booked = book.book(&request()).await.unwrap();

        assert_eq!(booked.slot, "09:00");
        assert_eq!(book.state().items().len(), 1);
        assert_eq!(book.state().items()[0].id, booked.appointment_id);
        assert_eq!(*store.fetches.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_book_rejects_empty_slot() {
        let (book, store) = book(FakeStore::default());
        let mut req = request();
        req.slot = "  ".to_string();

        let err = book.book(&req).await.unwrap_err();
        assert!(matches!(err, ClientError::Api(ApiError::InvalidRequest(_))));
        assert!(store.booked.lock().unwrap().is_empty());
        assert_eq!(*store.fetches.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_book_rejects_bad_date() {
        let (book, _) = book(FakeStore::default());
        let mut req = request();
        req.appointment_date = "June 1st".to_string();

        let err = book.book(&req).await.unwrap_err();
        assert_eq!(err.user_message("Booking failed"), "Invalid appointment date: June 1st");
    }

    #[tokio::test]
    async fn test_book_failure_leaves_list_alone() {
        let (book, store) = book(FakeStore {
            reject_create: true,
            ..Default::default()
        });
        book.list().load(1, None).await.unwrap();
        let before = book.state();

        let err = book.book(&request()).await.unwrap_err();

        assert_eq!(err.user_message("Booking failed"), "Slot already booked");
        assert_eq!(book.state(), before);
        assert_eq!(*store.fetches.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_and_cancel() {
        let (book, _) = book(FakeStore::default());
        let booked = book.book(&request()).await.unwrap();

        let confirmed = book
            .update(
                booked.appointment_id,
                &UpdateAppointmentRequest::default().status(AppointmentStatus::Confirmed),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
        assert_eq!(book.state().items()[0].status, AppointmentStatus::Confirmed);

        book.cancel(booked.appointment_id).await.unwrap();
        assert_eq!(book.state().items()[0].status, AppointmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_update_validation() {
        let (book, _) = book(FakeStore::default());
        let id = Uuid::new_v4();

        assert!(book.update(id, &UpdateAppointmentRequest::default()).await.is_err());

        let mut bad_date = UpdateAppointmentRequest::default().notes("x");
        bad_date.appointment_date = Some("tomorrow".to_string());
        assert!(book.update(id, &bad_date).await.is_err());

        let mut empty_slot = UpdateAppointmentRequest::default().notes("x");
        empty_slot.slot = Some(String::new());
        assert!(book.update(id, &empty_slot).await.is_err());
    }

    #[tokio::test]
    async fn test_book_over_hospital_api() {
        let server = MockServer::start();
        let doctor_id = Uuid::new_v4();
        let appointment_id = Uuid::new_v4();

        let create_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/mobile/appointments")
                .json_body(json!({
                    "doctor_id": doctor_id,
                    "appointment_date": "2024-06-01T00:00:00Z",
                    "slot": "10:30"
                }));
            then.status(201).json_body(json!({
                "success": true,
                "message": "Appointment created successfully",
                "data": {
                    "appointment_id": appointment_id,
                    "appointment_date": "2024-06-01",
                    "appointment_time": "10:30",
                    "slot": "10:30"
                }
            }));
        });
        let list_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/mobile/appointments")
                .query_param("page", "1")
                .query_param("limit", "20");
            then.status(200).json_body(json!({
                "success": true,
                "data": {
                    "appointments": [{
                        "id": appointment_id,
                        "doctor_id": doctor_id,
                        "patient_id": Uuid::new_v4(),
                        "appointment_date": "2024-06-01T00:00:00Z",
                        "slot": "10:30",
                        "status": "scheduled"
                    }],
                    "pagination": {
                        "page": 1, "limit": 20, "total": 1, "total_pages": 1,
                        "has_next": false, "has_prev": false
                    }
                }
            }));
        });

        let api = HospitalApi::new(server.base_url(), reqwest::Client::new(), None).unwrap();
        let book = AppointmentBook::new(Arc::new(AppointmentPages::new(api)), 20);
        let req = CreateAppointmentRequest::new(doctor_id, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(), "10:30");

        let booked = book.book(&req).await.unwrap();

        assert_eq!(booked.appointment_id, appointment_id);
        assert_eq!(book.state().items()[0].status, AppointmentStatus::Scheduled);
        create_mock.assert();
        list_mock.assert();
    }
}
