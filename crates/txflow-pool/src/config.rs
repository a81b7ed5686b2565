//! Pool configuration.

use std::time::Duration;

/// Configuration for the connection pool.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Core capacity: connections kept pooled when idle.
    pub max_size: u32,

    /// Extra connections admitted under load, destroyed on return
    /// instead of pooled. Total concurrent checkouts never exceed
    /// `max_size + max_overflow`.
    pub max_overflow: u32,

    /// Time to wait for a connection before timing out.
    pub pool_timeout: Duration,

    /// Time a connection can sit idle before it is discarded on next use.
    pub idle_timeout: Duration,

    /// Maximum age of a connection; older ones are recycled on next use.
    /// `None` disables age-based recycling.
    pub max_lifetime: Option<Duration>,

    /// Whether to probe idle connections before reuse.
    pub pre_ping: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            max_overflow: 10,
            pool_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Some(Duration::from_secs(1800)),
            pre_ping: true,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the core capacity.
    #[must_use]
    pub fn max_size(mut self, count: u32) -> Self {
        self.max_size = count;
        self
    }

    /// Set the overflow capacity.
    #[must_use]
    pub fn max_overflow(mut self, count: u32) -> Self {
        self.max_overflow = count;
        self
    }

    /// Set the connection acquisition timeout.
    #[must_use]
    pub fn pool_timeout(mut self, timeout: Duration) -> Self {
        self.pool_timeout = timeout;
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the maximum connection lifetime.
    #[must_use]
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = Some(lifetime);
        self
    }

    /// Disable age-based recycling.
    #[must_use]
    pub fn without_max_lifetime(mut self) -> Self {
        self.max_lifetime = None;
        self
    }

    /// Enable or disable the pre-reuse liveness probe.
    #[must_use]
    pub fn pre_ping(mut self, enabled: bool) -> Self {
        self.pre_ping = enabled;
        self
    }

    /// Total concurrent checkouts the pool admits.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_size as usize + self.max_overflow as usize
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), crate::error::PoolError> {
        if self.max_size == 0 {
            return Err(crate::error::PoolError::Configuration(
                "max_size must be greater than 0".into(),
            ));
        }
        if self.pool_timeout.is_zero() {
            return Err(crate::error::PoolError::Configuration(
                "pool_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_size, 10);
        assert_eq!(config.max_overflow, 10);
        assert_eq!(config.pool_timeout, Duration::from_secs(30));
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
        assert_eq!(config.max_lifetime, Some(Duration::from_secs(1800)));
        assert!(config.pre_ping);
        assert_eq!(config.capacity(), 20);
    }

    #[test]
    fn test_config_builder_methods() {
        let config = PoolConfig::new()
            .max_size(5)
            .max_overflow(0)
            .pool_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(120))
            .max_lifetime(Duration::from_secs(3600))
            .pre_ping(false);

        assert_eq!(config.max_size, 5);
        assert_eq!(config.max_overflow, 0);
        assert_eq!(config.pool_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(120));
        assert_eq!(config.max_lifetime, Some(Duration::from_secs(3600)));
        assert!(!config.pre_ping);
        assert_eq!(config.capacity(), 5);
    }

    #[test]
    fn test_without_max_lifetime() {
        let config = PoolConfig::new().without_max_lifetime();
        assert_eq!(config.max_lifetime, None);
    }

    #[test]
    fn test_config_validation_success() {
        assert!(PoolConfig::new().max_size(1).max_overflow(0).validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_max_size() {
        let result = PoolConfig::new().max_size(0).validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("max_size must be greater than 0")
        );
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let result = PoolConfig::new().pool_timeout(Duration::ZERO).validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("pool_timeout must be greater than zero")
        );
    }
}
