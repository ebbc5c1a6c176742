//! Pool entries wrapping one live connection each

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::connect::ManagedConnection;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(0);

/// A handle to one live connection plus its route, state, and timestamps
///
/// Entries are shared between the pool's bookkeeping and the caller that
/// leased them. Closing is sticky: once closed an entry is never leased
/// again.
pub struct PoolEntry<R, C, S = ()> {
    id: u64,
    route: R,
    created: Instant,
    valid_until: Option<Instant>,
    conn: Mutex<Option<C>>,
    state: Mutex<Option<S>>,
    updated: Mutex<Instant>,
    expiry: Mutex<Option<Instant>>,
    closed: AtomicBool,
}

impl<R, C, S> PoolEntry<R, C, S> {
    pub(crate) fn new(route: R, conn: C, time_to_live: Option<Duration>) -> Self {
        let now = Instant::now();
        let valid_until = time_to_live.and_then(|ttl| now.checked_add(ttl));
        Self {
            id: NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed),
            route,
            created: now,
            valid_until,
            conn: Mutex::new(Some(conn)),
            state: Mutex::new(None),
            updated: Mutex::new(now),
            expiry: Mutex::new(valid_until),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn route(&self) -> &R {
        &self.route
    }

    pub fn created(&self) -> Instant {
        self.created
    }

    /// Time of the last lease or release activity on this entry
    pub fn updated(&self) -> Instant {
        *self.updated.lock()
    }

    /// Access the underlying connection, `None` once the entry is closed
    pub fn connection(&self) -> Option<MappedMutexGuard<'_, C>> {
        MutexGuard::try_map(self.conn.lock(), |conn| conn.as_mut()).ok()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expiry.lock().is_some_and(|deadline| now >= deadline)
    }

    /// Refresh the update timestamp and recompute the expiry deadline
    ///
    /// The new deadline is `updated + keep_alive`, capped by the entry's
    /// total lifetime. `None` keeps only the lifetime cap.
    pub fn update_expiry(&self, keep_alive: Option<Duration>) {
        let now = Instant::now();
        *self.updated.lock() = now;
        let deadline = match (keep_alive.and_then(|k| now.checked_add(k)), self.valid_until) {
            (Some(keep), Some(valid)) => Some(keep.min(valid)),
            (Some(keep), None) => Some(keep),
            (None, valid) => valid,
        };
        *self.expiry.lock() = deadline;
    }

    pub(crate) fn touch(&self) {
        *self.updated.lock() = Instant::now();
    }

    pub fn state(&self) -> Option<S>
    where
        S: Clone,
    {
        self.state.lock().clone()
    }

    /// Attach an affinity discriminator consulted when the entry is reused
    pub fn set_state(&self, state: Option<S>) {
        *self.state.lock() = state;
    }

    pub(crate) fn state_matches(&self, wanted: Option<&S>) -> bool
    where
        S: PartialEq,
    {
        match (self.state.lock().as_ref(), wanted) {
            (Some(have), Some(want)) => have == want,
            (None, None) => true,
            _ => false,
        }
    }
}

impl<R, C, S> PoolEntry<R, C, S>
where
    C: ManagedConnection,
{
    /// True when the entry was closed or its connection dropped out from
    /// under it
    pub fn is_closed(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return true;
        }
        match self.conn.lock().as_ref() {
            Some(conn) => !conn.is_open(),
            None => true,
        }
    }

    /// Close the connection and discard it; repeated calls are no-ops
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            if let Some(mut conn) = self.conn.lock().take() {
                conn.close();
            }
        }
    }
}

impl<R, C, S> fmt::Debug for PoolEntry<R, C, S>
where
    R: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolEntry")
            .field("id", &self.id)
            .field("route", &self.route)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn entry(ttl: Option<Duration>) -> PoolEntry<&'static str, TestConn, &'static str> {
        PoolEntry::new("route", TestConn { open: true }, ttl)
    }

    #[test]
    fn close_is_sticky() {
        let entry = entry(None);
        assert!(!entry.is_closed());
        entry.close();
        assert!(entry.is_closed());
        assert!(entry.connection().is_none());
        entry.close();
        assert!(entry.is_closed());
    }

    #[test]
    fn dead_connection_reads_as_closed() {
        let entry = entry(None);
        entry.connection().unwrap().close();
        assert!(entry.is_closed());
    }

    #[test]
    fn expiry_honors_lifetime() {
        let entry_a = entry(Some(Duration::ZERO));
        assert!(entry_a.is_expired(Instant::now()));

        let entry_b = entry(Some(Duration::from_secs(3600)));
        assert!(!entry_b.is_expired(Instant::now()));
    }

    #[test]
    fn keep_alive_is_capped_by_lifetime() {
        let entry_a = entry(Some(Duration::ZERO));
        entry_a.update_expiry(Some(Duration::from_secs(3600)));
        assert!(entry_a.is_expired(Instant::now()));

        let entry_b = entry(None);
        entry_b.update_expiry(Some(Duration::ZERO));
        assert!(entry_b.is_expired(Instant::now()));
        entry_b.update_expiry(None);
        assert!(!entry_b.is_expired(Instant::now()));
    }

    #[test]
    fn state_matching() {
        let entry = entry(None);
        assert!(entry.state_matches(None));
        assert!(!entry.state_matches(Some(&"auth")));

        entry.set_state(Some("auth"));
        assert!(entry.state_matches(Some(&"auth")));
        assert!(!entry.state_matches(Some(&"other")));
        assert!(!entry.state_matches(None));
    }

    #[test]
    fn update_expiry_touches_timestamp() {
        let entry = entry(None);
        let before = entry.updated();
        std::thread::sleep(Duration::from_millis(5));
        entry.update_expiry(None);
        assert!(entry.updated() > before);
        assert!(entry.updated() >= entry.created());
    }
}
