//! String-encoded circuit breaker configuration

use crate::errors::ConfigurationError;

use std::time::Duration;

/// Configuration of a [`CircuitBreaker`](crate::CircuitBreaker) as it arrives
/// from the environment: both fields are strings holding non-negative integers.
///
/// - `max_failures_threshold`: failures tolerated before the breaker opens.
/// - `reset_timeout`: seconds the breaker stays open before letting a probe through.
///
/// With the `env` feature these map to `<PREFIX>_CB_MAX_FAILURES_THRESHOLD`
/// and `<PREFIX>_CB_RESET_TIMEOUT`.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::Configuration;
/// use std::time::Duration;
///
/// let config = Configuration::new("3", "5");
/// assert_eq!(config.failure_threshold().unwrap(), 3);
/// assert_eq!(config.reset_timeout_duration().unwrap(), Duration::from_secs(5));
///
/// assert!(Configuration::new("-1", "5").failure_threshold().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Configuration {
    #[cfg_attr(feature = "serde", serde(rename = "cb_max_failures_threshold", default))]
    pub max_failures_threshold: String,

    #[cfg_attr(feature = "serde", serde(rename = "cb_reset_timeout", default))]
    pub reset_timeout: String,
}

impl Configuration {
    pub fn new(max_failures_threshold: impl Into<String>, reset_timeout: impl Into<String>) -> Self {
        Self {
            max_failures_threshold: max_failures_threshold.into(),
            reset_timeout: reset_timeout.into(),
        }
    }

    /// Parsed failure threshold
    pub fn failure_threshold(&self) -> Result<u64, ConfigurationError> {
        parse_whole_number("MaxFailuresThreshold", &self.max_failures_threshold)
    }

    /// Parsed reset timeout, read as whole seconds
    pub fn reset_timeout_duration(&self) -> Result<Duration, ConfigurationError> {
        parse_whole_number("ResetTimeout", &self.reset_timeout).map(Duration::from_secs)
    }

    /// Load `<PREFIX>_CB_MAX_FAILURES_THRESHOLD` and `<PREFIX>_CB_RESET_TIMEOUT`
    /// from the process environment. Missing variables come back empty and
    /// fail later, when the breaker parses them.
    #[cfg(feature = "env")]
    pub fn from_env(prefix: &str) -> Result<Self, ConfigurationError> {
        Self::from_environment(config::Environment::with_prefix(prefix))
    }

    /// Load from a prepared [`config::Environment`] source.
    #[cfg(feature = "env")]
    pub fn from_environment(environment: config::Environment) -> Result<Self, ConfigurationError> {
        let loaded = config::Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        Ok(loaded)
    }
}

fn parse_whole_number(field: &'static str, value: &str) -> Result<u64, ConfigurationError> {
    value
        .parse::<u64>()
        .map_err(|source| ConfigurationError::InvalidParameter {
            field,
            value: value.to_string(),
            source,
        })
}
