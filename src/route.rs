//! Per-route bookkeeping of leased, idle, and pending connections

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::entry::PoolEntry;
use crate::errors::PoolError;
use crate::lease::LeaseRequest;

/// Bookkeeping for a single route
///
/// Holds that route's leased entries, idle entries in most-recently-freed
/// order, and the lease requests bound to outstanding connect attempts.
/// Does no global accounting and takes no locks; the pool core serializes
/// all access.
pub(crate) struct RouteSpecificPool<R, C, S> {
    leased: HashMap<u64, Arc<PoolEntry<R, C, S>>>,
    available: VecDeque<Arc<PoolEntry<R, C, S>>>,
    pending: HashMap<u64, LeaseRequest<R, C, S>>,
}

impl<R, C, S> RouteSpecificPool<R, C, S> {
    pub(crate) fn new() -> Self {
        Self {
            leased: HashMap::new(),
            available: VecDeque::new(),
            pending: HashMap::new(),
        }
    }

    pub(crate) fn leased_count(&self) -> usize {
        self.leased.len()
    }

    pub(crate) fn available_count(&self) -> usize {
        self.available.len()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn allocated_count(&self) -> usize {
        self.leased.len() + self.available.len() + self.pending.len()
    }

    /// Find an idle entry matching the requested state, most recently freed
    /// first, without removing it
    pub(crate) fn get_free(&self, state: Option<&S>) -> Option<Arc<PoolEntry<R, C, S>>>
    where
        S: PartialEq,
    {
        self.available
            .iter()
            .find(|entry| entry.state_matches(state))
            .cloned()
    }

    /// The least recently freed idle entry, the eviction victim
    pub(crate) fn get_last_used(&self) -> Option<Arc<PoolEntry<R, C, S>>> {
        self.available.back().cloned()
    }

    /// Move an idle entry into the leased set
    pub(crate) fn claim(&mut self, entry: &Arc<PoolEntry<R, C, S>>) {
        self.drop_available(entry.id());
        self.leased.insert(entry.id(), Arc::clone(entry));
    }

    /// Return a leased entry, keeping it as idle when `reusable`
    pub(crate) fn free(&mut self, entry: &Arc<PoolEntry<R, C, S>>, reusable: bool) -> bool {
        if self.leased.remove(&entry.id()).is_some() {
            if reusable {
                self.available.push_front(Arc::clone(entry));
            }
            true
        } else {
            false
        }
    }

    pub(crate) fn drop_available(&mut self, id: u64) {
        if let Some(pos) = self.available.iter().position(|entry| entry.id() == id) {
            self.available.remove(pos);
        }
    }

    /// Remove an entry from whichever of leased or available holds it
    pub(crate) fn remove(&mut self, entry: &Arc<PoolEntry<R, C, S>>) {
        if self.leased.remove(&entry.id()).is_none() {
            self.drop_available(entry.id());
        }
    }

    /// Bind a lease request to an outstanding connect attempt
    pub(crate) fn add_pending(&mut self, attempt: u64, request: LeaseRequest<R, C, S>) {
        self.pending.insert(attempt, request);
    }

    /// Resolve a connect attempt with a freshly created entry
    ///
    /// The entry is filed as leased and the bound request completed; the
    /// returned request still needs its callback fired by the core.
    pub(crate) fn completed(
        &mut self,
        attempt: u64,
        entry: Arc<PoolEntry<R, C, S>>,
    ) -> Option<LeaseRequest<R, C, S>> {
        let mut request = self.pending.remove(&attempt)?;
        self.leased.insert(entry.id(), Arc::clone(&entry));
        request.succeed(entry);
        Some(request)
    }

    pub(crate) fn failed(&mut self, attempt: u64, err: PoolError) -> Option<LeaseRequest<R, C, S>> {
        let mut request = self.pending.remove(&attempt)?;
        request.fail(err);
        Some(request)
    }

    pub(crate) fn cancelled(&mut self, attempt: u64) -> Option<LeaseRequest<R, C, S>> {
        let mut request = self.pending.remove(&attempt)?;
        request.cancel();
        Some(request)
    }

    pub(crate) fn timed_out(&mut self, attempt: u64) -> Option<LeaseRequest<R, C, S>> {
        let mut request = self.pending.remove(&attempt)?;
        request.fail_timeout();
        Some(request)
    }

    /// Cancel every bound request and drop all bookkeeping
    ///
    /// Returned requests still need their callbacks fired by the core.
    pub(crate) fn shutdown(&mut self) -> Vec<LeaseRequest<R, C, S>> {
        let requests = self
            .pending
            .drain()
            .map(|(_, mut request)| {
                request.cancel();
                request
            })
            .collect();
        self.leased.clear();
        self.available.clear();
        requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::connect::ManagedConnection;

    struct TestConn {
        open: bool,
    }

    impl ManagedConnection for TestConn {
        fn is_open(&self) -> bool {
            self.open
        }

        fn close(&mut self) {
            self.open = false;
        }
    }

    type TestEntry = Arc<PoolEntry<&'static str, TestConn, &'static str>>;
    type TestPool = RouteSpecificPool<&'static str, TestConn, &'static str>;

    fn entry() -> TestEntry {
        Arc::new(PoolEntry::new("route", TestConn { open: true }, None))
    }

    fn freed(pool: &mut TestPool) -> TestEntry {
        let entry = entry();
        pool.leased.insert(entry.id(), Arc::clone(&entry));
        pool.free(&entry, true);
        entry
    }

    #[test]
    fn get_free_prefers_most_recently_freed() {
        let mut pool = TestPool::new();
        let first = freed(&mut pool);
        let second = freed(&mut pool);
        assert_eq!(pool.get_free(None).unwrap().id(), second.id());
        assert_eq!(pool.get_last_used().unwrap().id(), first.id());
    }

    #[test]
    fn get_free_matches_state_exactly() {
        let mut pool = TestPool::new();
        let plain = freed(&mut pool);
        let tagged = freed(&mut pool);
        tagged.set_state(Some("auth"));

        assert_eq!(pool.get_free(Some(&"auth")).unwrap().id(), tagged.id());
        assert_eq!(pool.get_free(None).unwrap().id(), plain.id());
        assert!(pool.get_free(Some(&"other")).is_none());
    }

    #[test]
    fn claim_moves_available_to_leased() {
        let mut pool = TestPool::new();
        let entry = freed(&mut pool);
        assert_eq!(pool.available_count(), 1);

        pool.claim(&entry);
        assert_eq!(pool.available_count(), 0);
        assert_eq!(pool.leased_count(), 1);
        assert_eq!(pool.allocated_count(), 1);
    }

    #[test]
    fn free_discards_when_not_reusable() {
        let mut pool = TestPool::new();
        let entry = entry();
        pool.leased.insert(entry.id(), Arc::clone(&entry));
        assert!(pool.free(&entry, false));
        assert_eq!(pool.allocated_count(), 0);
        assert!(!pool.free(&entry, false));
    }

    #[test]
    fn completed_binds_entry_and_request() {
        let mut pool = TestPool::new();
        let (request, _future) =
            LeaseRequest::new("route", None, Some(Duration::from_secs(1)));
        pool.add_pending(7, request);
        assert_eq!(pool.pending_count(), 1);

        let entry = entry();
        let request = pool.completed(7, Arc::clone(&entry)).unwrap();
        assert_eq!(pool.pending_count(), 0);
        assert_eq!(pool.leased_count(), 1);
        request.fire();

        assert!(pool.completed(7, entry).is_none());
    }

    #[test]
    fn shutdown_cancels_bound_requests() {
        let mut pool = TestPool::new();
        let (request, _future) =
            LeaseRequest::new("route", None, Some(Duration::from_secs(1)));
        pool.add_pending(1, request);
        freed(&mut pool);

        let cancelled = pool.shutdown();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(pool.allocated_count(), 0);
    }
}
