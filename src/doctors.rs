//! Doctor directory
//!
//! Paginated doctor list plus an independent search overlay. Searching never
//! touches the list, so clearing a search returns to the list exactly as it
//! was left.

use crate::api::types::{Doctor, Page};
use crate::api::HospitalApi;
use crate::error::ClientError;
use crate::listing::{ListState, PageSource, PagedList};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Doctor search backend
#[async_trait]
pub trait DoctorSearch: Send + Sync {
    /// Search by free text and/or specialization
    async fn search_doctors(&self, query: Option<&str>, specialization: Option<&str>)
        -> Result<Vec<Doctor>, ClientError>;
}

#[async_trait]
impl DoctorSearch for HospitalApi {
    async fn search_doctors(
        &self,
        query: Option<&str>,
        specialization: Option<&str>,
    ) -> Result<Vec<Doctor>, ClientError> {
        let response = HospitalApi::search_doctors(self, query, specialization).await?;
        Ok(response.doctors)
    }
}

/// Doctor list pages, filtered by specialization
#[derive(Debug, Clone)]
pub struct DoctorPages {
    api: HospitalApi,
}

impl DoctorPages {
    /// Page source over the hospital API
    pub fn new(api: HospitalApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl PageSource for DoctorPages {
    type Item = Doctor;

    async fn fetch_page(&self, page: u32, limit: u32, filter: Option<&str>) -> Result<Page<Doctor>, ClientError> {
        self.api.list_doctors(page, limit, filter).await
    }
}

/// State of the search overlay
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchState {
    /// No search active
    #[default]
    Idle,
    /// Search in flight
    Loading,
    /// Matching doctors
    Success(Vec<Doctor>),
    /// Search failed
    Error(String),
}

/// Doctor list and search overlay
///
/// # Example
/// ```no_run
/// # async fn example(directory: swaasthya_client::DoctorDirectory) -> Result<(), swaasthya_client::ClientError> {
/// directory.list().load(1, Some("Cardiology".to_string())).await?;
/// directory.list().load_more().await?;
///
/// directory.search("sharma", "").await;
/// directory.clear_search();
/// # Ok(())
/// # }
/// ```
pub struct DoctorDirectory<S: PageSource<Item = Doctor> = DoctorPages> {
    inner: Arc<DirectoryInner<S>>,
}

struct DirectoryInner<S: PageSource<Item = Doctor>> {
    list: PagedList<S>,
    search: Arc<dyn DoctorSearch>,
    search_tx: watch::Sender<SearchState>,
    search_generation: AtomicU64,
}

impl<S: PageSource<Item = Doctor>> Clone for DoctorDirectory<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: PageSource<Item = Doctor>> DoctorDirectory<S> {
    /// Create a directory with its list in `Loading` and search `Idle`
    pub fn new(pages: Arc<S>, search: Arc<dyn DoctorSearch>, page_size: u32) -> Self {
        let (search_tx, _) = watch::channel(SearchState::Idle);
        Self {
            inner: Arc::new(DirectoryInner {
                list: PagedList::new(pages, "doctors", page_size),
                search,
                search_tx,
                search_generation: AtomicU64::new(0),
            }),
        }
    }

    /// The paginated doctor list
    pub fn list(&self) -> &PagedList<S> {
        &self.inner.list
    }

    /// Current list state
    pub fn list_state(&self) -> ListState<Doctor> {
        self.inner.list.state()
    }

    /// Current search state
    pub fn search_state(&self) -> SearchState {
        self.inner.search_tx.borrow().clone()
    }

    /// Receiver that observes every search state
    pub fn subscribe_search(&self) -> watch::Receiver<SearchState> {
        self.inner.search_tx.subscribe()
    }

    /// Run a search
    ///
    /// Blank query and specialization together reset the overlay to `Idle`
    /// without a request. Only the most recently issued search publishes its
    /// result.
    pub async fn search(&self, query: &str, specialization: &str) -> SearchState {
        let query = Some(query.trim()).filter(|q| !q.is_empty());
        let specialization = Some(specialization.trim()).filter(|s| !s.is_empty());

        // Nothing to search for
        if query.is_none() && specialization.is_none() {
            self.clear_search();
            return SearchState::Idle;
        }

        let generation = self.begin_search();
        let next = match self.inner.search.search_doctors(query, specialization).await {
            Ok(doctors) => SearchState::Success(doctors),
            Err(err) => SearchState::Error(err.user_message("Search failed")),
        };

        if !self.publish_if_current(generation, next.clone()) {
            debug!(?query, ?specialization, "dropping superseded search");
            return self.search_state();
        }
        next
    }

    /// Return to `Idle`, discarding any pending search
    pub fn clear_search(&self) {
        self.inner.search_tx.send_modify(|state| {
            self.inner.search_generation.fetch_add(1, Ordering::AcqRel);
            *state = SearchState::Idle;
        });
        debug!("search cleared");
    }

    // Generation bumps and the compare-and-publish below both run under the
    // channel's write lock, so a superseded result can never land after a
    // newer state.
    fn begin_search(&self) -> u64 {
        let mut generation = 0;
        self.inner.search_tx.send_modify(|state| {
            generation = self.inner.search_generation.fetch_add(1, Ordering::AcqRel) + 1;
            *state = SearchState::Loading;
        });
        debug!(generation, "search started");
        generation
    }

    fn publish_if_current(&self, generation: u64, next: SearchState) -> bool {
        let count = match &next {
            SearchState::Success(doctors) => Some(doctors.len()),
            _ => None,
        };
        let published = self.inner.search_tx.send_if_modified(|state| {
            if self.inner.search_generation.load(Ordering::Acquire) != generation {
                return false;
            }
            *state = next;
            true
        });
        if published {
            debug!(generation, ?count, "search finished");
        }
        published
    }
}

impl<S: PageSource<Item = Doctor>> std::fmt::Debug for DoctorDirectory<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoctorDirectory")
            .field("list", &self.inner.list)
            .field("search", &self.search_state())
            .finish()
    }
}
