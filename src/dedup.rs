//! Per-destination record of already-dispatched article links.
//!
//! In-memory only and monotonic: a link, once marked, stays marked for the
//! life of the process. There is deliberately no persistence — a restart
//! resets the dedup horizon to empty, which can re-deliver articles still
//! inside the freshness window. Conversely, links are marked at filter
//! acceptance time, before the send, so a crash between mark and send
//! loses that article for good. Both halves of this trade-off are
//! deliberate; duplicates and occasional losses are preferred over the
//! complexity of durable dedup state.

use crate::config::Language;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Thread-safe set of dispatched links per destination language.
///
/// One mutex guards the whole map. Critical sections are a hash lookup or
/// insert, and the lock is never held across an await, so contention
/// between the poll loop and on-demand session tasks stays negligible.
#[derive(Debug, Default)]
pub struct DedupStore {
    inner: Mutex<HashMap<Language, HashSet<String>>>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Has this link already been dispatched for this language?
    pub fn seen(&self, language: &Language, link: &str) -> bool {
        let inner = self.inner.lock().expect("dedup lock poisoned");
        inner.get(language).is_some_and(|links| links.contains(link))
    }

    /// Record a dispatched link. Idempotent.
    pub fn mark(&self, language: &Language, link: &str) {
        let mut inner = self.inner.lock().expect("dedup lock poisoned");
        inner
            .entry(language.clone())
            .or_default()
            .insert(link.to_string());
    }

    /// Atomically test-and-mark: returns true if the link was unseen and
    /// is now marked. One lock acquisition, so two concurrent callers can
    /// never both accept the same link.
    pub fn check_and_mark(&self, language: &Language, link: &str) -> bool {
        let mut inner = self.inner.lock().expect("dedup lock poisoned");
        inner
            .entry(language.clone())
            .or_default()
            .insert(link.to_string())
    }

    /// Number of links recorded for a language. Used in cycle logging.
    pub fn len(&self, language: &Language) -> usize {
        let inner = self.inner.lock().expect("dedup lock poisoned");
        inner.get(language).map_or(0, |links| links.len())
    }
}
