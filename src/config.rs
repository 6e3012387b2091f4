//! Pool configuration options

use std::time::Duration;

/// Pool size that disables the capacity check.
pub const UNBOUNDED_POOL_SIZE: u8 = u8::MAX;

/// Resource usage limit that lets a resource be reused forever.
pub const UNLIMITED_USAGE: u8 = 0;

/// Delay between two acquisition attempts when the pool is exhausted.
pub const DEFAULT_RETRY_ON_RESOURCE_DELAY: Duration = Duration::from_secs(1);

/// Configuration for resource pool behavior
///
/// # Examples
///
/// ```
/// use esox_resourcepool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_max_pool_size(4)
///     .with_resource_usage_limit(100)
///     .with_retry_on_resource_delay(Duration::from_millis(50));
///
/// assert_eq!(config.max_pool_size, 4);
/// assert_eq!(config.resource_usage_limit, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfiguration {
    /// Maximum number of distinct resources the pool will construct.
    /// `0` means no capacity at all, [`UNBOUNDED_POOL_SIZE`] means no limit.
    pub max_pool_size: u8,

    /// How many times a resource may be acquired before it is retired.
    /// [`UNLIMITED_USAGE`] (`0`) never retires a resource.
    pub resource_usage_limit: u8,

    /// Sleep between attempts of a retrying acquisition
    pub retry_on_resource_delay: Duration,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            max_pool_size: 10,
            resource_usage_limit: UNLIMITED_USAGE,
            retry_on_resource_delay: DEFAULT_RETRY_ON_RESOURCE_DELAY,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum pool size
    pub fn with_max_pool_size(mut self, size: u8) -> Self {
        self.max_pool_size = size;
        self
    }

    /// Remove the capacity limit
    ///
    /// ```
    /// use esox_resourcepool::{PoolConfiguration, UNBOUNDED_POOL_SIZE};
    ///
    /// let config = PoolConfiguration::new().with_unbounded_pool_size();
    /// assert!(config.is_unbounded());
    /// assert_eq!(config.max_pool_size, UNBOUNDED_POOL_SIZE);
    /// ```
    pub fn with_unbounded_pool_size(mut self) -> Self {
        self.max_pool_size = UNBOUNDED_POOL_SIZE;
        self
    }

    /// Set the per-resource usage limit
    pub fn with_resource_usage_limit(mut self, limit: u8) -> Self {
        self.resource_usage_limit = limit;
        self
    }

    /// Set the delay between retrying acquisition attempts
    pub fn with_retry_on_resource_delay(mut self, delay: Duration) -> Self {
        self.retry_on_resource_delay = delay;
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_pool_size == UNBOUNDED_POOL_SIZE
    }

    /// Maximum number of resources, or `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        (!self.is_unbounded()).then_some(usize::from(self.max_pool_size))
    }

    /// Whether a resource used `usage_count` times may still be handed out.
    pub(crate) fn allows_usage(&self, usage_count: u64) -> bool {
        self.resource_usage_limit == UNLIMITED_USAGE
            || usage_count < u64::from(self.resource_usage_limit)
    }
}
