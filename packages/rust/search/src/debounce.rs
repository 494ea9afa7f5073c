//! Debounced search-as-you-type.
//!
//! Each input aborts the pending evaluation before scheduling its own, so at
//! most one task is pending and only the latest query's results are ever
//! published on the watch channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use docweave_shared::SearchHit;

use crate::SearchIndex;

/// Results published for one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

/// Defers evaluation until input has been quiet for the debounce delay.
///
/// Must be driven from inside a tokio runtime.
pub struct DebouncedSearch {
    index: Arc<SearchIndex>,
    delay: Duration,
    pending: Option<JoinHandle<()>>,
    tx: Arc<watch::Sender<SearchResults>>,
}

impl DebouncedSearch {
    pub fn new(index: Arc<SearchIndex>, delay: Duration) -> Self {
        let (tx, _rx) = watch::channel(SearchResults::default());
        Self {
            index,
            delay,
            pending: None,
            tx: Arc::new(tx),
        }
    }

    /// Receiver observing published results.
    pub fn subscribe(&self) -> watch::Receiver<SearchResults> {
        self.tx.subscribe()
    }

    /// Most recently published results.
    pub fn latest(&self) -> SearchResults {
        self.tx.borrow().clone()
    }

    /// Feed one input change.
    ///
    /// Too-short queries publish an empty result immediately; anything else
    /// is evaluated after the delay unless another input arrives first.
    pub fn input(&mut self, query: &str) {
        self.cancel();

        let query = query.to_string();
        if query.trim().chars().count() < self.index.options().min_query_len {
            trace!(%query, "query below minimum length; publishing empty result");
            self.tx.send_replace(SearchResults {
                query,
                hits: Vec::new(),
            });
            return;
        }

        let index = Arc::clone(&self.index);
        let tx = Arc::clone(&self.tx);
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let hits = index.search(&query);
            debug!(%query, hits = hits.len(), "publishing debounced results");
            tx.send_replace(SearchResults { query, hits });
        }));
    }

    /// Replace the index wholesale (language switch). Pending work is
    /// cancelled and the published results are cleared.
    pub fn set_index(&mut self, index: Arc<SearchIndex>) {
        self.cancel();
        self.index = index;
        self.tx.send_replace(SearchResults::default());
    }

    /// Abort the pending evaluation, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Whether an evaluation is scheduled and has not finished.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DebouncedSearch {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SearchOptions;
    use crate::tests::entry;

    const DELAY: Duration = Duration::from_millis(150);

    fn index() -> Arc<SearchIndex> {
        Arc::new(SearchIndex::new(
            vec![
                entry("quick", "Speed", "The quick brown fox"),
                entry("lazy", "Rest", "over the lazy dog"),
            ],
            SearchOptions::default(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn only_latest_query_is_published() {
        let mut search = DebouncedSearch::new(index(), DELAY);
        let mut rx = search.subscribe();

        search.input("quick");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!rx.has_changed().unwrap());

        search.input("lazy");
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(rx.has_changed().unwrap());
        let published = rx.borrow_and_update().clone();
        assert_eq!(published.query, "lazy");
        assert_eq!(published.hits.len(), 1);
        assert_eq!(published.hits[0].id, "lazy");

        // The aborted "quick" evaluation never publishes.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_published_before_the_delay() {
        let mut search = DebouncedSearch::new(index(), DELAY);
        let rx = search.subscribe();

        search.input("fox");
        tokio::time::sleep(Duration::from_millis(149)).await;
        assert!(!rx.has_changed().unwrap());
        assert!(search.is_pending());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(search.latest().query, "fox");
    }

    #[tokio::test(start_paused = true)]
    async fn short_query_publishes_empty_immediately() {
        let mut search = DebouncedSearch::new(index(), DELAY);
        let mut rx = search.subscribe();

        search.input("quick");
        search.input("q");

        assert!(rx.has_changed().unwrap());
        let published = rx.borrow_and_update().clone();
        assert_eq!(published.query, "q");
        assert!(published.hits.is_empty());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn swapping_index_cancels_pending_work() {
        let mut search = DebouncedSearch::new(index(), DELAY);
        let mut rx = search.subscribe();

        search.input("quick");
        search.set_index(Arc::new(SearchIndex::default()));
        rx.borrow_and_update();
        assert!(!search.is_pending());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(search.latest(), SearchResults::default());

        search.input("quick");
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(search.latest().hits.is_empty());
    }
}
