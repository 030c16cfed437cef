//! Paginated list coordinator
//!
//! Drives a list view backed by a paged endpoint: first load, refresh, and
//! incremental "load more" that appends the next page in backend order.
//!
//! Guards:
//! - only one `load_more` runs at a time; extra calls return `Ok(false)`
//! - a `load`/`refresh` supersedes anything started before it, and results
//!   of superseded calls are dropped instead of published

use crate::api::types::{Page, PaginationInfo};
use crate::error::ClientError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

/// Backend collection that can be fetched a page at a time
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Item type of the collection
    type Item: Clone + Send + Sync + 'static;

    /// Fetch the 1-based `page` of at most `limit` items
    async fn fetch_page(&self, page: u32, limit: u32, filter: Option<&str>) -> Result<Page<Self::Item>, ClientError>;
}

/// State of a paginated list
#[derive(Debug, Clone, PartialEq)]
pub enum ListState<T> {
    /// First page (or a reload) is in flight
    Loading,
    /// Items fetched so far, in backend order
    Success {
        /// Accumulated items
        items: Vec<T>,
        /// Pagination of the most recently fetched page
        pagination: PaginationInfo,
    },
    /// The last fetch failed
    Error(String),
}

impl<T> ListState<T> {
    /// Items fetched so far (empty unless `Success`)
    pub fn items(&self) -> &[T] {
        match self {
            Self::Success { items, .. } => items,
            _ => &[],
        }
    }

    /// Pagination of the last fetched page
    pub fn pagination(&self) -> Option<&PaginationInfo> {
        match self {
            Self::Success { pagination, .. } => Some(pagination),
            _ => None,
        }
    }

    /// Whether another page can be appended
    pub fn has_next(&self) -> bool {
        self.pagination().is_some_and(|p| p.has_next)
    }
}

/// Where the list currently stands
#[derive(Debug, Default)]
struct Cursor {
    page: u32,
    filter: Option<String>,
    generation: u64,
}

/// Paginated list coordinator over a [`PageSource`]
pub struct PagedList<S: PageSource> {
    inner: Arc<ListInner<S>>,
}

struct ListInner<S: PageSource> {
    source: Arc<S>,
    noun: &'static str,
    page_size: u32,
    state_tx: watch::Sender<ListState<S::Item>>,
    cursor: Mutex<Cursor>,
    loading_more: AtomicBool,
}

impl<S: PageSource> Clone for PagedList<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: PageSource> PagedList<S> {
    /// Create a coordinator in the `Loading` state
    ///
    /// `noun` names the items in fallback error messages ("Failed to load
    /// doctors").
    pub fn new(source: Arc<S>, noun: &'static str, page_size: u32) -> Self {
        let (state_tx, _) = watch::channel(ListState::Loading);
        Self {
            inner: Arc::new(ListInner {
                source,
                noun,
                page_size: page_size.max(1),
                state_tx,
                cursor: Mutex::new(Cursor {
                    page: 1,
                    ..Default::default()
                }),
                loading_more: AtomicBool::new(false),
            }),
        }
    }

    /// Current state
    pub fn state(&self) -> ListState<S::Item> {
        self.inner.state_tx.borrow().clone()
    }

    /// Receiver that observes every published state
    pub fn subscribe(&self) -> watch::Receiver<ListState<S::Item>> {
        self.inner.state_tx.subscribe()
    }

    /// Page number of the last successfully fetched page
    pub fn current_page(&self) -> u32 {
        self.cursor().page
    }

    /// Filter the list was last loaded with
    pub fn current_filter(&self) -> Option<String> {
        self.cursor().filter.clone()
    }

    /// Items requested per page
    pub fn page_size(&self) -> u32 {
        self.inner.page_size
    }

    /// Whether a `load_more` is in flight
    pub fn is_loading_more(&self) -> bool {
        self.inner.loading_more.load(Ordering::Acquire)
    }

    /// Replace the list with `page`, fetched with `filter`
    ///
    /// Publishes `Loading`, then `Success` or `Error`. Blank filters count as
    /// no filter.
    pub async fn load(&self, page: u32, filter: Option<String>) -> Result<(), ClientError> {
        let page = page.max(1);
        let filter = filter.filter(|f| !f.trim().is_empty());

        let generation = {
            let mut cursor = self.cursor();
            cursor.generation += 1;
            self.publish(ListState::Loading);
            cursor.generation
        };

        let result = self
            .inner
            .source
            .fetch_page(page, self.inner.page_size, filter.as_deref())
            .await;

        let mut cursor = self.cursor();
        if cursor.generation != generation {
            debug!(noun = self.inner.noun, page, "dropping superseded load");
            return result.map(|_| ());
        }

        match result {
            Ok(fetched) => {
                cursor.page = page;
                cursor.filter = filter;
                self.publish(ListState::Success {
                    items: fetched.items,
                    pagination: fetched.pagination,
                });
                Ok(())
            }
            Err(err) => {
                let fallback = format!("Failed to load {}", self.inner.noun);
                self.publish(ListState::Error(err.user_message(&fallback)));
                Err(err)
            }
        }
    }

    /// Append the next page
    ///
    /// Returns `Ok(false)` without fetching when the list is not in
    /// `Success`, has no next page, or another `load_more` is in flight.
    pub async fn load_more(&self) -> Result<bool, ClientError> {
        if !self.inner.state_tx.borrow().has_next() {
            return Ok(false);
        }
        if self.inner.loading_more.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        let _in_flight = InFlight(&self.inner.loading_more);

        let (next_page, filter, generation) = {
            let cursor = self.cursor();
            (cursor.page + 1, cursor.filter.clone(), cursor.generation)
        };

        let result = self
            .inner
            .source
            .fetch_page(next_page, self.inner.page_size, filter.as_deref())
            .await;

        let mut cursor = self.cursor();
        if cursor.generation != generation {
            debug!(noun = self.inner.noun, page = next_page, "dropping superseded load_more");
            return result.map(|_| false);
        }

        match result {
            Ok(fetched) => {
                let mut appended = false;
                self.inner.state_tx.send_modify(|state| {
                    if let ListState::Success { items, pagination } = state {
                        items.extend(fetched.items);
                        *pagination = fetched.pagination;
                        appended = true;
                    }
                });
                if appended {
                    cursor.page = next_page;
                    debug!(noun = self.inner.noun, page = next_page, "appended page");
                }
                Ok(appended)
            }
            Err(err) => {
                let fallback = format!("Failed to load more {}", self.inner.noun);
                self.publish(ListState::Error(err.user_message(&fallback)));
                Err(err)
            }
        }
    }

    /// Reload page 1 with the current filter
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let filter = self.current_filter();
        self.load(1, filter).await
    }

    fn cursor(&self) -> MutexGuard<'_, Cursor> {
        // A panic while holding the lock cannot leave the cursor half-written
        self.inner.cursor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, state: ListState<S::Item>) {
        match &state {
            ListState::Loading => debug!(noun = self.inner.noun, "list loading"),
            ListState::Success { items, pagination } => {
                debug!(noun = self.inner.noun, count = items.len(), page = pagination.page, "list loaded")
            }
            ListState::Error(message) => debug!(noun = self.inner.noun, %message, "list failed"),
        }
        self.inner.state_tx.send_replace(state);
    }
}

impl<S: PageSource> std::fmt::Debug for PagedList<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedList")
            .field("noun", &self.inner.noun)
            .field("page", &self.current_page())
            .field("filter", &self.current_filter())
            .finish()
    }
}

/// Clears the in-flight flag when `load_more` returns
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
