//! One-shot lease requests and the futures handed to callers

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::entry::PoolEntry;
use crate::errors::{PoolError, PoolResult};

/// A caller's wait for an entry, bound to the route and state it asked for
///
/// The terminal outcome is sticky: only the first completion, failure, or
/// cancellation is recorded, and it is delivered exactly once when the
/// request is fired.
pub(crate) struct LeaseRequest<R, C, S> {
    route: R,
    state: Option<S>,
    connect_timeout: Option<Duration>,
    deadline: Option<Instant>,
    tx: oneshot::Sender<PoolResult<Arc<PoolEntry<R, C, S>>>>,
    outcome: Option<PoolResult<Arc<PoolEntry<R, C, S>>>>,
}

impl<R, C, S> LeaseRequest<R, C, S> {
    pub(crate) fn new(
        route: R,
        state: Option<S>,
        connect_timeout: Option<Duration>,
    ) -> (Self, LeaseFuture<R, C, S>) {
        let (tx, rx) = oneshot::channel();
        // An unrepresentable deadline waits without bound
        let deadline = connect_timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let request = Self {
            route,
            state,
            connect_timeout,
            deadline,
            tx,
            outcome: None,
        };
        (request, LeaseFuture { rx })
    }

    pub(crate) fn route(&self) -> &R {
        &self.route
    }

    pub(crate) fn state(&self) -> Option<&S> {
        self.state.as_ref()
    }

    pub(crate) fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub(crate) fn deadline_elapsed(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }

    pub(crate) fn succeed(&mut self, entry: Arc<PoolEntry<R, C, S>>) {
        if self.outcome.is_none() {
            self.outcome = Some(Ok(entry));
        }
    }

    pub(crate) fn fail(&mut self, err: PoolError) {
        if self.outcome.is_none() {
            self.outcome = Some(Err(err));
        }
    }

    pub(crate) fn fail_timeout(&mut self) {
        let waited = self.connect_timeout.unwrap_or_default();
        self.fail(PoolError::Timeout(waited));
    }

    pub(crate) fn cancel(&mut self) {
        self.fail(PoolError::Cancelled);
    }

    /// Deliver the terminal outcome to the waiting future
    ///
    /// A request fired without an outcome cancels the future. Delivery to a
    /// caller that dropped its future is a silent no-op.
    pub(crate) fn fire(self) {
        let LeaseRequest { tx, outcome, .. } = self;
        match outcome {
            Some(result) => {
                let _ = tx.send(result);
            }
            None => drop(tx),
        }
    }
}

/// Future returned by a lease call, resolving to a pool entry or an error
pub struct LeaseFuture<R, C, S = ()> {
    rx: oneshot::Receiver<PoolResult<Arc<PoolEntry<R, C, S>>>>,
}

impl<R, C, S> Future for LeaseFuture<R, C, S> {
    type Output = PoolResult<Arc<PoolEntry<R, C, S>>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(outcome) => outcome,
            Err(_) => Err(PoolError::Cancelled),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::connect::ManagedConnection;

    struct TestConn;

    impl ManagedConnection for TestConn {
        fn is_open(&self) -> bool {
            true
        }

        fn close(&mut self) {}
    }

    fn new_request() -> (
        LeaseRequest<&'static str, TestConn, ()>,
        LeaseFuture<&'static str, TestConn, ()>,
    ) {
        LeaseRequest::new("route", None, Some(Duration::from_secs(1)))
    }

    #[test]
    fn outcome_is_sticky() {
        let (mut request, _future) = new_request();
        let entry = Arc::new(PoolEntry::new("route", TestConn, None));
        request.succeed(Arc::clone(&entry));
        request.fail(PoolError::Cancelled);
        assert!(matches!(request.outcome, Some(Ok(_))));
    }

    #[test]
    fn deadline_only_when_bounded() {
        let (request, _future) =
            LeaseRequest::<&'static str, TestConn, ()>::new("route", None, None);
        assert!(!request.deadline_elapsed(Instant::now() + Duration::from_secs(3600)));

        let (request, _future) = new_request();
        assert!(!request.deadline_elapsed(Instant::now()));
        assert!(request.deadline_elapsed(Instant::now() + Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn fire_delivers_success() {
        let (mut request, future) = new_request();
        let entry = Arc::new(PoolEntry::new("route", TestConn, None));
        request.succeed(Arc::clone(&entry));
        request.fire();
        let leased = future.await.unwrap();
        assert_eq!(leased.id(), entry.id());
    }

    #[tokio::test]
    async fn fire_without_outcome_cancels() {
        let (request, future) = new_request();
        request.fire();
        assert!(matches!(future.await, Err(PoolError::Cancelled)));
    }

    #[tokio::test]
    async fn dropped_request_cancels_future() {
        let (request, future) = new_request();
        drop(request);
        assert!(matches!(future.await, Err(PoolError::Cancelled)));
    }

    #[test]
    fn fire_after_future_dropped_is_noop() {
        let (mut request, future) = new_request();
        drop(future);
        request.cancel();
        request.fire();
    }
}
