//! Health monitoring for connection pools

use crate::metrics::PoolStats;

/// Health snapshot of a connection pool
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Capacity utilization (0.0 to 1.0), leased plus pending over the
    /// global cap
    pub utilization: f64,

    /// Connections currently leased
    pub leased: usize,

    /// Connect attempts in flight
    pub pending: usize,

    /// Idle connections held
    pub available: usize,

    /// Lease requests waiting for capacity
    pub waiting: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub(crate) fn evaluate(stats: PoolStats, waiting: usize) -> Self {
        let used = stats.leased + stats.pending;
        let utilization = if stats.max > 0 {
            used as f64 / stats.max as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if waiting > 0 && used >= stats.max {
            warnings.push(format!("{} lease requests waiting for capacity", waiting));
            is_healthy = false;
        }

        Self {
            is_healthy,
            utilization,
            leased: stats.leased,
            pending: stats.pending,
            available: stats.available,
            waiting,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_pool_is_healthy() {
        let status = HealthStatus::evaluate(
            PoolStats {
                leased: 1,
                pending: 0,
                available: 3,
                max: 10,
            },
            0,
        );
        assert!(status.is_healthy());
        assert!(status.warnings.is_empty());
    }

    #[test]
    fn saturated_pool_warns() {
        let status = HealthStatus::evaluate(
            PoolStats {
                leased: 9,
                pending: 1,
                available: 0,
                max: 10,
            },
            2,
        );
        assert!(!status.is_healthy());
        assert_eq!(status.warnings.len(), 2);
        assert_eq!(status.waiting, 2);
    }
}
