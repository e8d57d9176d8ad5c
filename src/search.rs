use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::PostSource;
use crate::listing::{filter_and_sort, ListFilter};
use crate::models::Post;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Results of the latest dispatched search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    /// Sequence number of the query these belong to; 0 before the first.
    pub seq: u64,
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, Default)]
struct SearchInput {
    text: String,
    category: Option<String>,
}

struct Shared<S> {
    source: Arc<S>,
    latest_seq: AtomicU64,
    input: Mutex<SearchInput>,
    results: watch::Sender<SearchResults>,
}

/// Turns keystrokes into at most one query per quiet period.
///
/// Every keystroke restarts the timer. When it fires, the query gets the
/// next sequence number, and only a response carrying the latest number is
/// published; anything older is dropped on arrival. In-flight requests are
/// never aborted. Dropping the dispatcher cancels a pending timer.
pub struct QueryDispatcher<S> {
    shared: Arc<Shared<S>>,
    delay: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<S: PostSource + 'static> QueryDispatcher<S> {
    pub fn new(source: Arc<S>, delay: Duration) -> Self {
        let (results, _) = watch::channel(SearchResults::default());
        Self {
            shared: Arc::new(Shared {
                source,
                latest_seq: AtomicU64::new(0),
                input: Mutex::new(SearchInput::default()),
                results,
            }),
            delay,
            timer: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchResults> {
        self.shared.results.subscribe()
    }

    pub fn results(&self) -> SearchResults {
        self.shared.results.borrow().clone()
    }

    /// Sequence number of the most recently dispatched query.
    pub fn latest_seq(&self) -> u64 {
        self.shared.latest_seq.load(Ordering::SeqCst)
    }

    /// Record a keystroke. Must be called from within a tokio runtime.
    pub fn on_input(&self, text: impl Into<String>) {
        lock(&self.shared.input).text = text.into();
        self.reschedule();
    }

    /// Change the category filter; rescheduled like a keystroke.
    pub fn set_category(&self, category: Option<String>) {
        lock(&self.shared.input).category = category.filter(|c| !c.trim().is_empty());
        self.reschedule();
    }

    /// Drop a pending timer without dispatching.
    pub fn cancel(&self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
        }
    }

    fn reschedule(&self) {
        let shared = self.shared.clone();
        let delay = self.delay;

        let mut timer = lock(&self.timer);
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            Shared::dispatch(shared);
        }));
    }
}

impl<S: PostSource + 'static> Shared<S> {
    fn dispatch(shared: Arc<Self>) {
        let input = lock(&shared.input).clone();
        let seq = shared.latest_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let text = input.text.trim().to_string();
        if text.is_empty() && input.category.is_none() {
            tracing::debug!("Search #{} is empty, clearing results", seq);
            shared.publish(seq, Vec::new());
            return;
        }

        let filter = ListFilter {
            category: input.category,
            user: None,
            query: Some(text).filter(|t| !t.is_empty()),
        };
        tracing::debug!("Dispatching search #{} {:?}", seq, filter);

        // Detached so that later keystrokes can't cancel the request.
        tokio::spawn(async move {
            let posts = match shared.source.list_posts(&filter).await {
                Ok(posts) => filter_and_sort(posts, &filter),
                Err(e) => {
                    tracing::warn!("Search #{} failed: {}", seq, e);
                    Vec::new()
                }
            };
            shared.publish(seq, posts);
        });
    }

    /// Publishes `posts` only if `seq` is still the latest query. The check
    /// runs under the channel's write lock, so two responses finishing
    /// together cannot publish out of order.
    fn publish(&self, seq: u64, posts: Vec<Post>) {
        let mut posts = Some(posts);
        self.results.send_if_modified(|current| {
            let latest = self.latest_seq.load(Ordering::SeqCst);
            if seq != latest {
                tracing::debug!("Discarding stale search #{} (latest #{})", seq, latest);
                return false;
            }
            *current = SearchResults {
                seq,
                posts: posts.take().unwrap_or_default(),
            };
            true
        });
    }
}

impl<S> Drop for QueryDispatcher<S> {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
