//! Pool configuration options

use std::time::Duration;

/// Configuration for connection pool behavior
///
/// # Examples
///
/// ```
/// use routepool::PoolConfig;
/// use std::time::Duration;
///
/// let config = PoolConfig::new()
///     .with_max_total(50)
///     .with_default_max_per_route(5)
///     .with_time_to_live(Duration::from_secs(300));
///
/// assert_eq!(config.max_total, 50);
/// assert_eq!(config.default_max_per_route, 5);
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections leased or being opened across all routes
    pub max_total: usize,

    /// Per-route allocation cap used when no route override is present
    pub default_max_per_route: usize,

    /// Total lifetime of a pooled connection, unlimited when `None`
    pub time_to_live: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_total: 20,
            default_max_per_route: 2,
            time_to_live: None,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global connection cap
    pub fn with_max_total(mut self, max: usize) -> Self {
        self.max_total = max;
        self
    }

    /// Set the per-route connection cap used when no override is present
    pub fn with_default_max_per_route(mut self, max: usize) -> Self {
        self.default_max_per_route = max;
        self
    }

    /// Set the total lifetime of pooled connections
    ///
    /// # Examples
    ///
    /// ```
    /// use routepool::PoolConfig;
    /// use std::time::Duration;
    ///
    /// let config = PoolConfig::new().with_time_to_live(Duration::from_secs(60));
    /// assert_eq!(config.time_to_live, Some(Duration::from_secs(60)));
    /// ```
    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_convention() {
        let config = PoolConfig::default();
        assert_eq!(config.max_total, 20);
        assert_eq!(config.default_max_per_route, 2);
        assert!(config.time_to_live.is_none());
    }

    #[test]
    fn builder_chains() {
        let config = PoolConfig::new()
            .with_max_total(8)
            .with_default_max_per_route(4)
            .with_time_to_live(Duration::from_secs(1));
        assert_eq!(config.max_total, 8);
        assert_eq!(config.default_max_per_route, 4);
        assert_eq!(config.time_to_live, Some(Duration::from_secs(1)));
    }
}
