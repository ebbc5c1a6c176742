//! The route-partitioned connection pool core

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crossbeam::queue::SegQueue;
use parking_lot::Mutex;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::PoolConfig;
use crate::connect::{
    AddressResolver, ConnectionFactory, ConnectionInitiator, ReactorStatus,
};
use crate::entry::PoolEntry;
use crate::errors::{PoolError, PoolResult};
use crate::health::HealthStatus;
use crate::lease::{LeaseFuture, LeaseRequest};
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics, PoolStats};
use crate::route::RouteSpecificPool;

/// Key identifying a destination; equality and hashing are the caller's
pub trait Route: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> Route for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Optional affinity discriminator carried by entries and lease requests
pub trait LeaseState: Clone + PartialEq + Send + Sync + 'static {}

impl<T> LeaseState for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// Lifecycle hooks invoked by the pool while it holds its internal lock
///
/// Implementations must not call back into the pool.
pub trait PoolObserver<R, C, S>: Send + Sync {
    fn on_lease(&self, _entry: &Arc<PoolEntry<R, C, S>>) {}

    fn on_release(&self, _entry: &Arc<PoolEntry<R, C, S>>) {}

    fn on_reuse(&self, _entry: &Arc<PoolEntry<R, C, S>>) {}
}

struct NoopObserver;

impl<R, C, S> PoolObserver<R, C, S> for NoopObserver {}

type ConnOf<R, I, F> =
    <F as ConnectionFactory<R, <I as ConnectionInitiator>::Session>>::Connection;

/// Non-blocking, route-partitioned connection pool
///
/// Callers lease entries keyed by route; the pool reuses idle connections,
/// opens new ones through the injected [`ConnectionInitiator`] when caps
/// permit, and queues unsatisfied requests in FIFO order. Cloning the pool
/// clones a handle to the same shared state.
///
/// # Examples
///
/// ```ignore
/// let pool = ConnectionPool::new(initiator, factory, resolver, PoolConfig::default());
///
/// let entry = pool.lease(route, None, Some(Duration::from_secs(5)))?.await?;
/// // use entry.connection() ...
/// pool.release(&entry, true);
/// ```
pub struct ConnectionPool<R, I, F, S = ()>
where
    R: Route,
    S: LeaseState,
    I: ConnectionInitiator,
    F: ConnectionFactory<R, I::Session>,
{
    core: Arc<PoolCore<R, I, F, S>>,
}

impl<R, I, F, S> Clone for ConnectionPool<R, I, F, S>
where
    R: Route,
    S: LeaseState,
    I: ConnectionInitiator,
    F: ConnectionFactory<R, I::Session>,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

struct PendingConnect<R> {
    route: R,
    cancel: CancellationToken,
}

struct PoolInner<R, I, F, S>
where
    I: ConnectionInitiator,
    F: ConnectionFactory<R, I::Session>,
{
    route_pools: HashMap<R, RouteSpecificPool<R, ConnOf<R, I, F>, S>>,
    leased: HashMap<u64, Arc<PoolEntry<R, ConnOf<R, I, F>, S>>>,
    available: VecDeque<Arc<PoolEntry<R, ConnOf<R, I, F>, S>>>,
    pending: HashMap<u64, PendingConnect<R>>,
    leasing_requests: VecDeque<LeaseRequest<R, ConnOf<R, I, F>, S>>,
    max_per_route: HashMap<R, usize>,
    default_max_per_route: usize,
    max_total: usize,
}

impl<R, I, F, S> PoolInner<R, I, F, S>
where
    R: Route,
    S: LeaseState,
    I: ConnectionInitiator,
    F: ConnectionFactory<R, I::Session>,
{
    fn route_pool(&mut self, route: &R) -> &mut RouteSpecificPool<R, ConnOf<R, I, F>, S> {
        self.route_pools
            .entry(route.clone())
            .or_insert_with(RouteSpecificPool::new)
    }

    fn max_for_route(&self, route: &R) -> usize {
        self.max_per_route
            .get(route)
            .copied()
            .unwrap_or(self.default_max_per_route)
    }

    fn drop_from_available(&mut self, id: u64) {
        if let Some(pos) = self.available.iter().position(|entry| entry.id() == id) {
            self.available.remove(pos);
        }
    }

    fn purge_route_pools(&mut self) {
        self.route_pools.retain(|_, pool| pool.allocated_count() > 0);
    }
}

struct PoolCore<R, I, F, S>
where
    I: ConnectionInitiator,
    F: ConnectionFactory<R, I::Session>,
{
    initiator: Arc<I>,
    factory: F,
    resolver: Box<dyn AddressResolver<R>>,
    observer: Box<dyn PoolObserver<R, ConnOf<R, I, F>, S>>,
    time_to_live: Option<Duration>,
    inner: Mutex<PoolInner<R, I, F, S>>,
    completed_requests: SegQueue<LeaseRequest<R, ConnOf<R, I, F>, S>>,
    is_shut_down: AtomicBool,
    metrics: MetricsTracker,
    next_attempt_id: AtomicU64,
}

/// What became of one request during a dispatch pass
enum Processed<Q> {
    /// Terminal via reuse; consumed a dispatch slot
    Satisfied(Q),
    /// Terminal failure; does not consume a dispatch slot
    Completed(Q),
    /// Handed to a new connect attempt; consumed a dispatch slot
    ConnectPending,
    /// No capacity; stays queued
    Stalled(Q),
}

enum AttemptOutcome<T> {
    Ready(T),
    Failed(std::io::Error),
    TimedOut,
    Cancelled,
}

async fn timed<T>(
    limit: Option<Duration>,
    future: impl Future<Output = T>,
) -> Result<T, time::error::Elapsed> {
    match limit {
        Some(limit) => time::timeout(limit, future).await,
        None => Ok(future.await),
    }
}

impl<R, I, F, S> PoolCore<R, I, F, S>
where
    R: Route,
    S: LeaseState,
    I: ConnectionInitiator,
    F: ConnectionFactory<R, I::Session>,
{
    /// Drain the completion queue, delivering outcomes outside the lock
    fn fire_callbacks(&self) {
        while let Some(request) = self.completed_requests.pop() {
            request.fire();
        }
    }

    fn lease(
        self: &Arc<Self>,
        route: R,
        state: Option<S>,
        connect_timeout: Option<Duration>,
    ) -> PoolResult<LeaseFuture<R, ConnOf<R, I, F>, S>> {
        if self.is_shut_down.load(Ordering::Acquire) {
            return Err(PoolError::ShutDown);
        }
        self.metrics.total_leases.fetch_add(1, Ordering::Relaxed);
        let (request, future) = LeaseRequest::new(route, state, connect_timeout);
        {
            let mut inner = self.inner.lock();
            match self.process_pending_request(&mut inner, request) {
                Processed::Stalled(request) => {
                    trace!(route = ?request.route(), "lease request queued");
                    inner.leasing_requests.push_back(request);
                }
                Processed::Satisfied(request) | Processed::Completed(request) => {
                    self.completed_requests.push(request);
                }
                Processed::ConnectPending => {}
            }
        }
        self.fire_callbacks();
        Ok(future)
    }

    fn release(
        self: &Arc<Self>,
        entry: &Arc<PoolEntry<R, ConnOf<R, I, F>, S>>,
        reusable: bool,
    ) {
        if self.is_shut_down.load(Ordering::Acquire) {
            return;
        }
        {
            let mut inner = self.inner.lock();
            if inner.leased.remove(&entry.id()).is_some() {
                let route = entry.route().clone();
                inner.route_pool(&route).free(entry, reusable);
                if reusable {
                    entry.touch();
                    inner.available.push_front(Arc::clone(entry));
                    self.observer.on_release(entry);
                    trace!(route = ?route, entry = entry.id(), "connection returned to pool");
                } else {
                    entry.close();
                    trace!(route = ?route, entry = entry.id(), "connection discarded");
                }
                self.process_next_pending_request(&mut inner);
            }
        }
        self.fire_callbacks();
    }

    /// Try to satisfy one request: reuse an idle entry or start a connect
    ///
    /// A deadline-expired request is failed but reported as not advanced,
    /// so an outer scan removes it without giving up its dispatch slot.
    fn process_pending_request(
        self: &Arc<Self>,
        inner: &mut PoolInner<R, I, F, S>,
        mut request: LeaseRequest<R, ConnOf<R, I, F>, S>,
    ) -> Processed<LeaseRequest<R, ConnOf<R, I, F>, S>> {
        if request.deadline_elapsed(Instant::now()) {
            request.fail_timeout();
            self.metrics.total_timeouts.fetch_add(1, Ordering::Relaxed);
            return Processed::Completed(request);
        }
        let route = request.route().clone();

        // Reuse path: skip over entries that died while idle
        loop {
            let Some(entry) = inner.route_pool(&route).get_free(request.state()) else {
                break;
            };
            if entry.is_closed() || entry.is_expired(Instant::now()) {
                entry.close();
                inner.drop_from_available(entry.id());
                inner.route_pool(&route).drop_available(entry.id());
                continue;
            }
            inner.drop_from_available(entry.id());
            inner.route_pool(&route).claim(&entry);
            inner.leased.insert(entry.id(), Arc::clone(&entry));
            self.metrics.total_reused.fetch_add(1, Ordering::Relaxed);
            trace!(route = ?route, entry = entry.id(), "reusing idle connection");
            request.succeed(Arc::clone(&entry));
            self.observer.on_reuse(&entry);
            self.observer.on_lease(&entry);
            return Processed::Satisfied(request);
        }

        // New connection is needed; shrink the route below its cap first
        let per_route_cap = inner.max_for_route(&route);
        let allocated = inner.route_pool(&route).allocated_count();
        let excess = (allocated + 1).saturating_sub(per_route_cap);
        for _ in 0..excess {
            let Some(victim) = inner.route_pool(&route).get_last_used() else {
                break;
            };
            victim.close();
            inner.drop_from_available(victim.id());
            inner.route_pool(&route).remove(&victim);
            self.metrics.total_evicted.fetch_add(1, Ordering::Relaxed);
            debug!(route = ?route, entry = victim.id(), "evicted idle connection over route cap");
        }
        if inner.route_pool(&route).allocated_count() >= per_route_cap {
            return Processed::Stalled(request);
        }

        let total_used = inner.pending.len() + inner.leased.len();
        let free_capacity = inner.max_total.saturating_sub(total_used);
        if free_capacity == 0 {
            return Processed::Stalled(request);
        }
        // Make room so pending + leased stays within the global cap once
        // this connect is issued
        if inner.available.len() > free_capacity - 1 {
            if let Some(victim) = inner.available.pop_back() {
                victim.close();
                let victim_route = victim.route().clone();
                if let Some(pool) = inner.route_pools.get_mut(&victim_route) {
                    pool.remove(&victim);
                }
                self.metrics.total_evicted.fetch_add(1, Ordering::Relaxed);
                debug!(route = ?victim_route, entry = victim.id(), "evicted global LRU idle connection");
            }
        }

        let remote = match self.resolver.resolve_remote(&route) {
            Ok(addr) => addr,
            Err(err) => {
                request.fail(PoolError::Io(err));
                return Processed::Completed(request);
            }
        };
        let local = match self.resolver.resolve_local(&route) {
            Ok(addr) => addr,
            Err(err) => {
                request.fail(PoolError::Io(err));
                return Processed::Completed(request);
            }
        };

        let attempt = self.next_attempt_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        self.spawn_connect(attempt, remote, local, request.connect_timeout(), cancel.clone());
        inner.pending.insert(
            attempt,
            PendingConnect {
                route: route.clone(),
                cancel,
            },
        );
        inner.route_pool(&route).add_pending(attempt, request);
        self.metrics.total_connects.fetch_add(1, Ordering::Relaxed);
        debug!(route = ?route, attempt, remote = %remote, "initiating connection");
        Processed::ConnectPending
    }

    fn spawn_connect(
        self: &Arc<Self>,
        attempt: u64,
        remote: SocketAddr,
        local: Option<SocketAddr>,
        connect_timeout: Option<Duration>,
        cancel: CancellationToken,
    ) {
        let weak = Arc::downgrade(self);
        let initiator = Arc::clone(&self.initiator);
        tokio::spawn(async move {
            let connect = initiator.connect(remote, local);
            let outcome = tokio::select! {
                _ = cancel.cancelled() => AttemptOutcome::Cancelled,
                result = timed(connect_timeout, connect) => match result {
                    Ok(Ok(session)) => AttemptOutcome::Ready(session),
                    Ok(Err(err)) => AttemptOutcome::Failed(err),
                    Err(_) => AttemptOutcome::TimedOut,
                },
            };
            let Some(core) = Weak::upgrade(&weak) else {
                return;
            };
            match outcome {
                AttemptOutcome::Ready(session) => core.attempt_completed(attempt, session),
                AttemptOutcome::Failed(err) => core.attempt_failed(attempt, err),
                AttemptOutcome::TimedOut => core.attempt_timed_out(attempt),
                AttemptOutcome::Cancelled => core.attempt_cancelled(attempt),
            }
        });
    }

    fn attempt_completed(self: &Arc<Self>, attempt: u64, session: I::Session) {
        if self.is_shut_down.load(Ordering::Acquire) {
            return;
        }
        {
            let mut inner = self.inner.lock();
            let Some(pending) = inner.pending.remove(&attempt) else {
                return;
            };
            let route = pending.route;
            match self.factory.create(&route, session) {
                Ok(conn) => {
                    let entry =
                        Arc::new(PoolEntry::new(route.clone(), conn, self.time_to_live));
                    match inner.route_pool(&route).completed(attempt, Arc::clone(&entry)) {
                        Some(request) => {
                            inner.leased.insert(entry.id(), Arc::clone(&entry));
                            self.completed_requests.push(request);
                            self.observer.on_lease(&entry);
                            debug!(route = ?route, entry = entry.id(), "connection established and leased");
                        }
                        None => entry.close(),
                    }
                }
                Err(err) => {
                    self.metrics
                        .total_connect_failures
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(route = ?route, error = %err, "connection factory failed");
                    if let Some(request) =
                        inner.route_pool(&route).failed(attempt, PoolError::Io(err))
                    {
                        self.completed_requests.push(request);
                    }
                }
            }
        }
        self.fire_callbacks();
    }

    fn attempt_cancelled(self: &Arc<Self>, attempt: u64) {
        if self.is_shut_down.load(Ordering::Acquire) {
            return;
        }
        {
            let mut inner = self.inner.lock();
            let Some(pending) = inner.pending.remove(&attempt) else {
                return;
            };
            if let Some(request) = inner.route_pool(&pending.route).cancelled(attempt) {
                self.completed_requests.push(request);
            }
            if self.initiator.status() <= ReactorStatus::Active {
                self.process_next_pending_request(&mut inner);
            }
        }
        self.fire_callbacks();
    }

    fn attempt_failed(self: &Arc<Self>, attempt: u64, err: std::io::Error) {
        if self.is_shut_down.load(Ordering::Acquire) {
            return;
        }
        {
            let mut inner = self.inner.lock();
            let Some(pending) = inner.pending.remove(&attempt) else {
                return;
            };
            self.metrics
                .total_connect_failures
                .fetch_add(1, Ordering::Relaxed);
            debug!(route = ?pending.route, attempt, error = %err, "connect attempt failed");
            if let Some(request) = inner
                .route_pool(&pending.route)
                .failed(attempt, PoolError::Io(err))
            {
                self.completed_requests.push(request);
            }
            self.process_next_pending_request(&mut inner);
        }
        self.fire_callbacks();
    }

    fn attempt_timed_out(self: &Arc<Self>, attempt: u64) {
        if self.is_shut_down.load(Ordering::Acquire) {
            return;
        }
        {
            let mut inner = self.inner.lock();
            let Some(pending) = inner.pending.remove(&attempt) else {
                return;
            };
            self.metrics.total_timeouts.fetch_add(1, Ordering::Relaxed);
            debug!(route = ?pending.route, attempt, "connect attempt timed out");
            if let Some(request) = inner.route_pool(&pending.route).timed_out(attempt) {
                self.completed_requests.push(request);
            }
            self.process_next_pending_request(&mut inner);
        }
        self.fire_callbacks();
    }

    /// Scan the wait queue, stopping after one request is advanced
    fn process_next_pending_request(self: &Arc<Self>, inner: &mut PoolInner<R, I, F, S>) {
        self.scan_queue(inner, true);
    }

    /// Scan the whole wait queue after a bulk change in conditions
    fn process_pending_requests(self: &Arc<Self>, inner: &mut PoolInner<R, I, F, S>) {
        self.scan_queue(inner, false);
    }

    fn scan_queue(
        self: &Arc<Self>,
        inner: &mut PoolInner<R, I, F, S>,
        stop_at_first_advance: bool,
    ) {
        let mut index = 0;
        while index < inner.leasing_requests.len() {
            let Some(request) = inner.leasing_requests.remove(index) else {
                break;
            };
            match self.process_pending_request(inner, request) {
                Processed::Stalled(request) => {
                    inner.leasing_requests.insert(index, request);
                    index += 1;
                }
                Processed::Completed(request) => {
                    self.completed_requests.push(request);
                }
                Processed::Satisfied(request) => {
                    self.completed_requests.push(request);
                    if stop_at_first_advance {
                        return;
                    }
                }
                Processed::ConnectPending => {
                    if stop_at_first_advance {
                        return;
                    }
                }
            }
        }
    }

    fn validate_pending_requests(&self) {
        {
            let mut inner = self.inner.lock();
            let now = Instant::now();
            let mut index = 0;
            while index < inner.leasing_requests.len() {
                if inner.leasing_requests[index].deadline_elapsed(now) {
                    if let Some(mut request) = inner.leasing_requests.remove(index) {
                        request.fail_timeout();
                        self.metrics.total_timeouts.fetch_add(1, Ordering::Relaxed);
                        self.completed_requests.push(request);
                    }
                } else {
                    index += 1;
                }
            }
        }
        self.fire_callbacks();
    }

    fn shutdown(&self, wait: Duration) {
        if self
            .is_shut_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!("shutting down connection pool");
            self.fire_callbacks();
            {
                let mut inner = self.inner.lock();
                for pending in inner.pending.values() {
                    pending.cancel.cancel();
                }
                for entry in inner.available.iter() {
                    entry.close();
                }
                for entry in inner.leased.values() {
                    entry.close();
                }
                let mut cancelled = Vec::new();
                for pool in inner.route_pools.values_mut() {
                    cancelled.extend(pool.shutdown());
                }
                for request in cancelled {
                    self.completed_requests.push(request);
                }
                inner.route_pools.clear();
                inner.leased.clear();
                inner.pending.clear();
                inner.available.clear();
                // Dropping queued requests drops their senders, which the
                // waiting futures observe as cancellation
                inner.leasing_requests.clear();
                self.initiator.shutdown(wait);
            }
            self.fire_callbacks();
        }
    }

    fn enum_available(self: &Arc<Self>, mut callback: impl FnMut(&Arc<PoolEntry<R, ConnOf<R, I, F>, S>>)) {
        {
            let mut inner = self.inner.lock();
            let snapshot: Vec<_> = inner.available.iter().cloned().collect();
            for entry in &snapshot {
                callback(entry);
                if entry.is_closed() {
                    inner.drop_from_available(entry.id());
                    let route = entry.route().clone();
                    if let Some(pool) = inner.route_pools.get_mut(&route) {
                        pool.remove(entry);
                    }
                }
            }
            self.process_pending_requests(&mut inner);
            inner.purge_route_pools();
        }
        self.fire_callbacks();
    }

    fn enum_leased(self: &Arc<Self>, mut callback: impl FnMut(&Arc<PoolEntry<R, ConnOf<R, I, F>, S>>)) {
        {
            let mut inner = self.inner.lock();
            let snapshot: Vec<_> = inner.leased.values().cloned().collect();
            for entry in &snapshot {
                callback(entry);
            }
            self.process_pending_requests(&mut inner);
        }
        self.fire_callbacks();
    }
}

impl<R, I, F, S> ConnectionPool<R, I, F, S>
where
    R: Route,
    S: LeaseState,
    I: ConnectionInitiator,
    F: ConnectionFactory<R, I::Session>,
{
    /// Create a new pool around an initiator, factory, and resolver
    pub fn new(
        initiator: I,
        factory: F,
        resolver: impl AddressResolver<R>,
        config: PoolConfig,
    ) -> Self {
        Self::with_observer(initiator, factory, resolver, config, NoopObserver)
    }

    /// Create a pool with lifecycle observer hooks installed
    pub fn with_observer(
        initiator: I,
        factory: F,
        resolver: impl AddressResolver<R>,
        config: PoolConfig,
        observer: impl PoolObserver<R, ConnOf<R, I, F>, S> + 'static,
    ) -> Self {
        assert!(config.max_total > 0, "max total must be positive");
        assert!(
            config.default_max_per_route > 0,
            "default max per route must be positive"
        );
        let core = Arc::new(PoolCore {
            initiator: Arc::new(initiator),
            factory,
            resolver: Box::new(resolver),
            observer: Box::new(observer),
            time_to_live: config.time_to_live,
            inner: Mutex::new(PoolInner {
                route_pools: HashMap::new(),
                leased: HashMap::new(),
                available: VecDeque::new(),
                pending: HashMap::new(),
                leasing_requests: VecDeque::new(),
                max_per_route: HashMap::new(),
                default_max_per_route: config.default_max_per_route,
                max_total: config.max_total,
            }),
            completed_requests: SegQueue::new(),
            is_shut_down: AtomicBool::new(false),
            metrics: MetricsTracker::new(),
            next_attempt_id: AtomicU64::new(0),
        });
        Self { core }
    }

    /// Lease an entry for `route`, preferring idle entries whose state
    /// matches `state`
    ///
    /// `connect_timeout` bounds both the wait for capacity and the connect
    /// attempt itself; `None` waits without bound. Fails synchronously with
    /// [`PoolError::ShutDown`] once the pool is shut down.
    pub fn lease(
        &self,
        route: R,
        state: Option<S>,
        connect_timeout: Option<Duration>,
    ) -> PoolResult<LeaseFuture<R, ConnOf<R, I, F>, S>> {
        self.core.lease(route, state, connect_timeout)
    }

    /// Return a leased entry, keeping it for reuse when `reusable`
    ///
    /// Releasing an entry that is not currently leased is a no-op.
    pub fn release(&self, entry: &Arc<PoolEntry<R, ConnOf<R, I, F>, S>>, reusable: bool) {
        self.core.release(entry, reusable);
    }

    pub fn is_shutdown(&self) -> bool {
        self.core.is_shut_down.load(Ordering::Acquire)
    }

    /// Shut down the pool: cancel pending connects, close all connections,
    /// cancel waiting leases, and shut down the initiator
    pub fn shutdown(&self, wait: Duration) {
        self.core.shutdown(wait);
    }

    /// Fail every queued lease request whose deadline has passed
    pub fn validate_pending_requests(&self) {
        self.core.validate_pending_requests();
    }

    pub fn set_max_total(&self, max: usize) {
        assert!(max > 0, "max total must be positive");
        self.core.inner.lock().max_total = max;
    }

    pub fn get_max_total(&self) -> usize {
        self.core.inner.lock().max_total
    }

    pub fn set_default_max_per_route(&self, max: usize) {
        assert!(max > 0, "max per route must be positive");
        self.core.inner.lock().default_max_per_route = max;
    }

    pub fn get_default_max_per_route(&self) -> usize {
        self.core.inner.lock().default_max_per_route
    }

    /// Override the allocation cap for one route
    ///
    /// Reductions do not evict eagerly; the route is shrunk on its next
    /// lease.
    pub fn set_max_per_route(&self, route: R, max: usize) {
        assert!(max > 0, "max per route must be positive");
        self.core.inner.lock().max_per_route.insert(route, max);
    }

    pub fn get_max_per_route(&self, route: &R) -> usize {
        self.core.inner.lock().max_for_route(route)
    }

    /// Pool-wide counters
    pub fn total_stats(&self) -> PoolStats {
        let inner = self.core.inner.lock();
        PoolStats {
            leased: inner.leased.len(),
            pending: inner.pending.len(),
            available: inner.available.len(),
            max: inner.max_total,
        }
    }

    /// Counters scoped to one route
    pub fn stats(&self, route: &R) -> PoolStats {
        let mut inner = self.core.inner.lock();
        let max = inner.max_for_route(route);
        let pool = inner.route_pool(route);
        PoolStats {
            leased: pool.leased_count(),
            pending: pool.pending_count(),
            available: pool.available_count(),
            max,
        }
    }

    /// Snapshot of all known routes
    pub fn routes(&self) -> Vec<R> {
        self.core.inner.lock().route_pools.keys().cloned().collect()
    }

    /// Visit every idle entry under the pool lock
    ///
    /// Entries the callback closes are removed, the wait queue is rescanned,
    /// and route pools left empty are purged.
    pub fn enum_available(&self, callback: impl FnMut(&Arc<PoolEntry<R, ConnOf<R, I, F>, S>>)) {
        self.core.enum_available(callback);
    }

    /// Visit every leased entry under the pool lock
    pub fn enum_leased(&self, callback: impl FnMut(&Arc<PoolEntry<R, ConnOf<R, I, F>, S>>)) {
        self.core.enum_leased(callback);
    }

    /// Close idle entries whose last activity is at least `idle_time` ago
    pub fn close_idle(&self, idle_time: Duration) {
        let Some(deadline) = Instant::now().checked_sub(idle_time) else {
            return;
        };
        self.enum_available(|entry| {
            if entry.updated() <= deadline {
                entry.close();
            }
        });
    }

    /// Close idle entries whose expiry deadline has passed
    pub fn close_expired(&self) {
        let now = Instant::now();
        self.enum_available(|entry| {
            if entry.is_expired(now) {
                entry.close();
            }
        });
    }

    /// Cumulative metrics together with current gauges
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.core.inner.lock();
        self.core.metrics.get_metrics(
            inner.leased.len(),
            inner.pending.len(),
            inner.available.len(),
            inner.max_total,
        )
    }

    /// Export metrics in Prometheus exposition format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&std::collections::HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }

    /// Health snapshot derived from current stats and the wait queue
    pub fn health(&self) -> HealthStatus {
        let (stats, waiting) = {
            let inner = self.core.inner.lock();
            (
                PoolStats {
                    leased: inner.leased.len(),
                    pending: inner.pending.len(),
                    available: inner.available.len(),
                    max: inner.max_total,
                },
                inner.leasing_requests.len(),
            )
        };
        HealthStatus::evaluate(stats, waiting)
    }
}
