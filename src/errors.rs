//! Error types for the resource pool and the circuit breaker

use std::num::ParseIntError;
use thiserror::Error;

/// Reason a [`Context`](crate::Context) stopped accepting work.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("resource - pool limit reached")]
    PoolLimitReached,

    #[error("acquiring of resource was stopped: {0}")]
    Context(#[from] ContextError),
}

impl PoolError {
    /// Whether the error comes from the caller's context rather than the pool.
    pub fn is_context(&self) -> bool {
        matches!(self, PoolError::Context(_))
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

/// Outcome of a call rejected or failed inside a [`CircuitBreaker`](crate::CircuitBreaker).
///
/// `Open` is the fail-fast rejection; the action was never run. `Action`
/// carries whatever the action itself returned, untouched.
#[derive(Error, Debug)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    Open,

    #[error(transparent)]
    Action(E),
}

impl<E> CircuitBreakerError<E> {
    /// True when the breaker short-circuited the call.
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open)
    }

    /// The action's own error, or `None` for a fail-fast rejection.
    pub fn into_action_error(self) -> Option<E> {
        match self {
            CircuitBreakerError::Open => None,
            CircuitBreakerError::Action(err) => Some(err),
        }
    }
}

/// Failure to turn a string-encoded breaker [`Configuration`](crate::Configuration) into settings.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("failed to parse parameter for {field} in CircuitBreaker (value: {value:?})")]
    InvalidParameter {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[cfg(feature = "env")]
    #[error("failed to load CircuitBreaker configuration")]
    Source(#[from] config::ConfigError),
}
