mod batch;
mod profile;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;

use crate::source::{decode_items, ContentSource, PageQuery, SourceError};

pub use batch::{load_batch, BatchOutcome, BatchRequest};
pub use profile::{load_profile, CollectionFailure, Profile, ProfileLimits};

/// Accumulated page state for one remotely-sourced collection. Owned by
/// the page, mutated only by its [`Pager`].
#[derive(Clone, Debug)]
pub struct PageState<T> {
    pub records: Vec<T>,
    pub has_more: bool,
    pub is_loading: bool,
    pub last_error: Option<String>,
}

impl<T> Default for PageState<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            has_more: false,
            is_loading: false,
            last_error: None,
        }
    }
}

/// What one load attempt did to the state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { appended: usize, has_more: bool },
    /// A page advance was already in flight; this call was a no-op.
    AlreadyLoading,
    /// The response arrived for a collection the pager has since
    /// switched away from and was discarded.
    Superseded,
    /// The fetch failed; the error is recorded in `last_error`.
    Failed,
}

struct PagerCore<T> {
    collection: String,
    epoch: u64,
    state: PageState<T>,
}

/// Paged loader for one named collection. Handles are cheap clones
/// sharing state, so a "load more" control and the rendering read side
/// can hold the same pager.
///
/// At most one page advance is in flight at a time: the `is_loading`
/// flag is checked synchronously before any request starts, and a
/// second call while loading is a no-op. The flag is cleared on every
/// exit path, including panic and cancellation.
pub struct Pager<T> {
    source: Arc<dyn ContentSource>,
    page_size: usize,
    core: Arc<Mutex<PagerCore<T>>>,
}

impl<T> Clone for Pager<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            page_size: self.page_size,
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: DeserializeOwned> Pager<T> {
    pub fn new(
        source: Arc<dyn ContentSource>,
        collection: impl Into<String>,
        page_size: usize,
    ) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            core: Arc::new(Mutex::new(PagerCore {
                collection: collection.into(),
                epoch: 0,
                state: PageState::default(),
            })),
        }
    }

    pub fn snapshot(&self) -> PageState<T>
    where
        T: Clone,
    {
        lock(&self.core).state.clone()
    }

    pub fn collection(&self) -> String {
        lock(&self.core).collection.clone()
    }

    /// Switches the pager to another collection: state resets to empty
    /// and any in-flight response for the old collection is discarded
    /// when it lands.
    pub fn set_collection(&self, collection: impl Into<String>) {
        let mut core = lock(&self.core);
        core.collection = collection.into();
        core.epoch += 1;
        core.state.records.clear();
        core.state.has_more = false;
        core.state.last_error = None;
    }

    /// Fetches the first page, replacing any previous records. On
    /// failure the records stay empty and `last_error` is set.
    pub async fn load_initial(&self) -> LoadOutcome {
        let (collection, epoch) = {
            let mut core = lock(&self.core);
            if core.state.is_loading {
                return LoadOutcome::AlreadyLoading;
            }
            core.state.is_loading = true;
            core.state.records.clear();
            core.state.has_more = false;
            (core.collection.clone(), core.epoch)
        };

        let _clear = LoadingFlag { core: &self.core };
        let fetched = self.fetch_page(&collection, 0).await;
        self.apply(epoch, &collection, fetched, true)
    }

    /// Fetches the page after the records accumulated so far and
    /// appends it. A call while a load is in flight is a no-op, so two
    /// overlapping advances can never fetch the same page twice.
    pub async fn load_more(&self) -> LoadOutcome {
        let (collection, epoch, offset) = {
            let mut core = lock(&self.core);
            if core.state.is_loading {
                return LoadOutcome::AlreadyLoading;
            }
            core.state.is_loading = true;
            (
                core.collection.clone(),
                core.epoch,
                core.state.records.len(),
            )
        };

        let _clear = LoadingFlag { core: &self.core };
        let fetched = self.fetch_page(&collection, offset).await;
        self.apply(epoch, &collection, fetched, false)
    }

    async fn fetch_page(&self, collection: &str, skip: usize) -> Result<(Vec<T>, bool), SourceError> {
        let page = self
            .source
            .fetch_page(collection, PageQuery::page(self.page_size, skip))
            .await?;
        let has_next = page.has_next;
        let records = decode_items(collection, page.items)?;
        Ok((records, has_next))
    }

    fn apply(
        &self,
        epoch: u64,
        collection: &str,
        fetched: Result<(Vec<T>, bool), SourceError>,
        replace: bool,
    ) -> LoadOutcome {
        let mut core = lock(&self.core);
        if core.epoch != epoch {
            tracing::debug!(collection, "discarding superseded response");
            return LoadOutcome::Superseded;
        }

        match fetched {
            Ok((records, has_next)) => {
                let appended = records.len();
                if replace {
                    core.state.records = records;
                } else {
                    core.state.records.extend(records);
                }
                core.state.has_more = has_next;
                core.state.last_error = None;
                tracing::debug!(collection, appended, has_next, "page loaded");
                LoadOutcome::Loaded {
                    appended,
                    has_more: has_next,
                }
            }
            Err(e) => {
                tracing::warn!(collection, error = %e, "page load failed");
                core.state.last_error = Some(e.to_string());
                LoadOutcome::Failed
            }
        }
    }
}

/// Clears `is_loading` when dropped, whatever path the load takes out.
struct LoadingFlag<'a, T> {
    core: &'a Mutex<PagerCore<T>>,
}

impl<T> Drop for LoadingFlag<'_, T> {
    fn drop(&mut self) {
        lock(self.core).state.is_loading = false;
    }
}

fn lock<T>(core: &Mutex<PagerCore<T>>) -> MutexGuard<'_, PagerCore<T>> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Typed `getById` lookup for detail pages. A missing item surfaces as
/// [`SourceError::NotFound`] so the page can show its dedicated
/// not-found view.
pub async fn load_detail<T: DeserializeOwned>(
    source: &dyn ContentSource,
    collection: &str,
    id: &str,
) -> Result<T, SourceError> {
    crate::source::fetch_item(source, collection, id).await
}
