//! # routepool
//!
//! Non-blocking, route-partitioned connection pool for async Rust with
//! per-route and global capacity caps, FIFO fairness, and LRU eviction.
//!
//! ## Features
//!
//! - Leases keyed by an opaque route, with optional state affinity for reuse
//! - Asynchronous, cancellable connect attempts through an injected initiator
//! - Per-route and global caps enforced by evicting idle LRU connections
//! - FIFO fairness across waiting callers
//! - Future completion outside the pool lock via a lock-free queue
//! - Idle and expiry sweeps, per-route stats, Prometheus metrics export
//!
//! ## Quick Start
//!
//! ```ignore
//! use routepool::{ConnectionPool, PoolConfig, TokioConnectionInitiator};
//! use std::time::Duration;
//!
//! let pool = ConnectionPool::new(
//!     TokioConnectionInitiator::new(),
//!     my_factory,
//!     my_resolver,
//!     PoolConfig::new().with_max_total(50).with_default_max_per_route(5),
//! );
//!
//! let entry = pool.lease(route, None, Some(Duration::from_secs(5)))?.await?;
//! // ... use entry.connection() ...
//! pool.release(&entry, true);
//! ```

mod config;
mod connect;
mod entry;
mod errors;
mod health;
mod lease;
mod metrics;
mod pool;
mod route;

pub use config::PoolConfig;
pub use connect::{
    AddressResolver, ConnectFuture, ConnectionFactory, ConnectionInitiator, ManagedConnection,
    ReactorStatus, TokioConnectionInitiator,
};
pub use entry::PoolEntry;
pub use errors::{PoolError, PoolResult};
pub use health::HealthStatus;
pub use lease::LeaseFuture;
pub use metrics::{MetricsExporter, PoolMetrics, PoolStats};
pub use pool::{ConnectionPool, LeaseState, PoolObserver, Route};
