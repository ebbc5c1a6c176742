//! Pool statistics and metrics export

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter snapshot for a route or for the whole pool
///
/// Leased and pending connections count against capacity; available ones do
/// not, but they do count against the per-route allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently handed out to callers
    pub leased: usize,

    /// Connect attempts in flight
    pub pending: usize,

    /// Idle connections held for reuse
    pub available: usize,

    /// The applicable cap (global or per-route)
    pub max: usize,
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[leased: {}; pending: {}; available: {}; max: {}]",
            self.leased, self.pending, self.available, self.max
        )
    }
}

/// Cumulative metrics data for a pool
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Total lease calls accepted
    pub total_leases: u64,

    /// Leases satisfied by reusing an idle connection
    pub total_reused: u64,

    /// Connect attempts initiated
    pub total_connects: u64,

    /// Connect attempts that failed, including factory failures
    pub total_connect_failures: u64,

    /// Leases or connects that hit their deadline
    pub total_timeouts: u64,

    /// Idle connections evicted to honor a cap
    pub total_evicted: u64,

    /// Current leased connections
    pub leased: usize,

    /// Current in-flight connect attempts
    pub pending: usize,

    /// Current idle connections
    pub available: usize,

    /// Global connection cap
    pub max_total: usize,

    /// Capacity utilization ratio (0.0 to 1.0), leased plus pending over the
    /// global cap
    pub utilization: f64,
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        // Gauge metrics
        output.push_str("# HELP connpool_connections_leased Connections currently leased\n");
        output.push_str("# TYPE connpool_connections_leased gauge\n");
        output.push_str(&format!(
            "connpool_connections_leased{{{}}} {}\n",
            labels, metrics.leased
        ));

        output.push_str("# HELP connpool_connections_pending Connect attempts in flight\n");
        output.push_str("# TYPE connpool_connections_pending gauge\n");
        output.push_str(&format!(
            "connpool_connections_pending{{{}}} {}\n",
            labels, metrics.pending
        ));

        output.push_str("# HELP connpool_connections_available Idle connections held\n");
        output.push_str("# TYPE connpool_connections_available gauge\n");
        output.push_str(&format!(
            "connpool_connections_available{{{}}} {}\n",
            labels, metrics.available
        ));

        output.push_str("# HELP connpool_utilization Capacity utilization ratio\n");
        output.push_str("# TYPE connpool_utilization gauge\n");
        output.push_str(&format!(
            "connpool_utilization{{{}}} {:.2}\n",
            labels, metrics.utilization
        ));

        // Counter metrics
        output.push_str("# HELP connpool_leases_total Lease calls accepted\n");
        output.push_str("# TYPE connpool_leases_total counter\n");
        output.push_str(&format!(
            "connpool_leases_total{{{}}} {}\n",
            labels, metrics.total_leases
        ));

        output.push_str("# HELP connpool_reuses_total Leases satisfied by reuse\n");
        output.push_str("# TYPE connpool_reuses_total counter\n");
        output.push_str(&format!(
            "connpool_reuses_total{{{}}} {}\n",
            labels, metrics.total_reused
        ));

        output.push_str("# HELP connpool_connects_total Connect attempts initiated\n");
        output.push_str("# TYPE connpool_connects_total counter\n");
        output.push_str(&format!(
            "connpool_connects_total{{{}}} {}\n",
            labels, metrics.total_connects
        ));

        output.push_str("# HELP connpool_connect_failures_total Failed connect attempts\n");
        output.push_str("# TYPE connpool_connect_failures_total counter\n");
        output.push_str(&format!(
            "connpool_connect_failures_total{{{}}} {}\n",
            labels, metrics.total_connect_failures
        ));

        output.push_str("# HELP connpool_timeouts_total Leases or connects timed out\n");
        output.push_str("# TYPE connpool_timeouts_total counter\n");
        output.push_str(&format!(
            "connpool_timeouts_total{{{}}} {}\n",
            labels, metrics.total_timeouts
        ));

        output.push_str("# HELP connpool_evictions_total Idle connections evicted\n");
        output.push_str("# TYPE connpool_evictions_total counter\n");
        output.push_str(&format!(
            "connpool_evictions_total{{{}}} {}\n",
            labels, metrics.total_evicted
        ));

        output
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
pub(crate) struct MetricsTracker {
    pub total_leases: AtomicU64,
    pub total_reused: AtomicU64,
    pub total_connects: AtomicU64,
    pub total_connect_failures: AtomicU64,
    pub total_timeouts: AtomicU64,
    pub total_evicted: AtomicU64,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            total_leases: AtomicU64::new(0),
            total_reused: AtomicU64::new(0),
            total_connects: AtomicU64::new(0),
            total_connect_failures: AtomicU64::new(0),
            total_timeouts: AtomicU64::new(0),
            total_evicted: AtomicU64::new(0),
        }
    }

    pub fn get_metrics(
        &self,
        leased: usize,
        pending: usize,
        available: usize,
        max_total: usize,
    ) -> PoolMetrics {
        let utilization = if max_total > 0 {
            (leased + pending) as f64 / max_total as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_leases: self.total_leases.load(Ordering::Relaxed),
            total_reused: self.total_reused.load(Ordering::Relaxed),
            total_connects: self.total_connects.load(Ordering::Relaxed),
            total_connect_failures: self.total_connect_failures.load(Ordering::Relaxed),
            total_timeouts: self.total_timeouts.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
            leased,
            pending,
            available,
            max_total,
            utilization,
        }
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_display() {
        let stats = PoolStats {
            leased: 1,
            pending: 2,
            available: 3,
            max: 4,
        };
        assert_eq!(stats.to_string(), "[leased: 1; pending: 2; available: 3; max: 4]");
    }

    #[test]
    fn utilization_counts_capacity_consumers() {
        let tracker = MetricsTracker::new();
        let metrics = tracker.get_metrics(3, 1, 5, 8);
        assert!((metrics.utilization - 0.5).abs() < f64::EPSILON);
        assert_eq!(metrics.available, 5);
    }

    #[test]
    fn prometheus_export_carries_labels() {
        let tracker = MetricsTracker::new();
        tracker.total_leases.fetch_add(7, Ordering::Relaxed);
        let metrics = tracker.get_metrics(0, 0, 0, 10);

        let mut tags = HashMap::new();
        tags.insert("service".to_string(), "gateway".to_string());

        let output = MetricsExporter::export_prometheus(&metrics, "upstream", Some(&tags));
        assert!(output.contains("connpool_connections_leased"));
        assert!(output.contains("connpool_leases_total{pool=\"upstream\",service=\"gateway\"} 7"));
    }
}
