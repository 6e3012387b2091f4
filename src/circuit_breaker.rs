//! Circuit breaker pattern implementation

use crate::breaker_config::Configuration;
use crate::errors::{CircuitBreakerError, ConfigurationError};

use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

/// Circuit breaker state
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{CircuitBreaker, CircuitBreakerState};
/// use std::time::Duration;
///
/// let breaker = CircuitBreaker::with_settings(3, Duration::from_secs(60));
/// assert_eq!(breaker.state(), CircuitBreakerState::Closed);
/// assert_eq!(CircuitBreakerState::HalfOpen.to_string(), "Half-Open");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitBreakerState {
    /// Circuit is closed - actions run, failures are counted
    Closed,

    /// Circuit is half-open - actions run to probe recovery
    HalfOpen,

    /// Circuit is open - failing fast
    Open,
}

impl CircuitBreakerState {
    pub fn is_state(self, needed: CircuitBreakerState) -> bool {
        self == needed
    }
}

impl fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitBreakerState::Closed => "Closed",
            CircuitBreakerState::HalfOpen => "Half-Open",
            CircuitBreakerState::Open => "Open",
        };
        f.write_str(name)
    }
}

type Hook = Box<dyn Fn() + Send + Sync>;

struct BreakerState {
    current: CircuitBreakerState,
    failure_count: u64,
    /// Time of the most recent failure
    last_attempt: Option<Instant>,
}

/// Circuit breaker for protecting against cascading failures
///
/// Every failed action raises the failure count; every successful one lowers
/// it by one. Once the count exceeds the threshold the breaker opens and
/// rejects calls with [`CircuitBreakerError::Open`] without running them.
/// After the reset timeout has passed since the last failure, the next call
/// is let through as a half-open probe. The breaker closes again when
/// half-open successes bring the failure count back to zero; a success that
/// lands while the breaker is open never closes it.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{CircuitBreaker, CircuitBreakerState};
/// use std::time::Duration;
///
/// let breaker = CircuitBreaker::with_settings(1, Duration::from_secs(60));
///
/// for _ in 0..2 {
///     let _ = breaker.proceed(|| Err::<(), _>("downstream failed"));
/// }
/// assert_eq!(breaker.state(), CircuitBreakerState::Open);
///
/// let rejected = breaker.proceed(|| Ok::<_, &str>(42));
/// assert!(rejected.unwrap_err().is_open());
/// ```
pub struct CircuitBreaker {
    state: RwLock<BreakerState>,
    failure_threshold: u64,
    reset_timeout: Duration,
    on_success: Option<Hook>,
    on_failure: Option<Hook>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("CircuitBreaker")
            .field("state", &state.current)
            .field("failure_count", &state.failure_count)
            .field("failure_threshold", &self.failure_threshold)
            .field("reset_timeout", &self.reset_timeout)
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a circuit breaker from string-encoded configuration.
    ///
    /// Fails, without building a breaker, when either field is not a
    /// non-negative whole number.
    pub fn new(config: &Configuration) -> Result<Self, ConfigurationError> {
        let reset_timeout = config.reset_timeout_duration()?;
        let failure_threshold = config.failure_threshold()?;
        Ok(Self::with_settings(failure_threshold, reset_timeout))
    }

    /// Create a circuit breaker from typed settings
    pub fn with_settings(failure_threshold: u64, reset_timeout: Duration) -> Self {
        Self {
            state: RwLock::new(BreakerState {
                current: CircuitBreakerState::Closed,
                failure_count: 0,
                last_attempt: None,
            }),
            failure_threshold,
            reset_timeout,
            on_success: None,
            on_failure: None,
        }
    }

    /// Run `hook` after every action that succeeds.
    pub fn with_on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_success = Some(Box::new(hook));
        self
    }

    /// Run `hook` after every action that fails.
    pub fn with_on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_failure = Some(Box::new(hook));
        self
    }

    /// Get the current state
    pub fn state(&self) -> CircuitBreakerState {
        self.state.read().current
    }

    pub fn failure_count(&self) -> u64 {
        self.state.read().failure_count
    }

    pub fn failure_threshold(&self) -> u64 {
        self.failure_threshold
    }

    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Run `action` unless the breaker is open.
    ///
    /// The action's error is handed back inside
    /// [`CircuitBreakerError::Action`]; a rejected call yields
    /// [`CircuitBreakerError::Open`] and the action is not run.
    pub fn proceed<F, R, E>(&self, action: F) -> Result<R, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Result<R, E>,
    {
        self.admit()?;
        let outcome = action();
        self.settle(outcome)
    }

    /// Async variant of [`proceed`](Self::proceed). No lock is held while the
    /// action's future runs.
    pub async fn proceed_async<F, Fut, R, E>(&self, action: F) -> Result<R, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        self.admit()?;
        let outcome = action().await;
        self.settle(outcome)
    }

    /// Reset the circuit breaker
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.failure_count = 0;
        state.current = CircuitBreakerState::Closed;
        debug!("circuit breaker reset");
    }

    fn admit<E>(&self) -> Result<(), CircuitBreakerError<E>> {
        if self.state.read().current != CircuitBreakerState::Open {
            return Ok(());
        }

        // Re-checked under the write lock: another caller may already have
        // moved the breaker to half-open.
        let mut state = self.state.write();
        match state.current {
            CircuitBreakerState::Closed | CircuitBreakerState::HalfOpen => Ok(()),
            CircuitBreakerState::Open => {
                let timed_out = state
                    .last_attempt
                    .is_none_or(|last| last.elapsed() > self.reset_timeout);
                if !timed_out {
                    return Err(CircuitBreakerError::Open);
                }
                state.current = CircuitBreakerState::HalfOpen;
                debug!(failure_count = state.failure_count, "circuit breaker half-open, probing");
                Ok(())
            }
        }
    }

    fn settle<R, E>(&self, outcome: Result<R, E>) -> Result<R, CircuitBreakerError<E>> {
        match outcome {
            Ok(result) => {
                if let Some(hook) = &self.on_success {
                    hook();
                }
                self.record_success();
                Ok(result)
            }
            Err(err) => {
                self.record_failure();
                if let Some(hook) = &self.on_failure {
                    hook();
                }
                Err(CircuitBreakerError::Action(err))
            }
        }
    }

    fn record_failure(&self) {
        let mut state = self.state.write();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_attempt = Some(Instant::now());

        if state.failure_count > self.failure_threshold && state.current != CircuitBreakerState::Open {
            state.current = CircuitBreakerState::Open;
            debug!(
                failure_count = state.failure_count,
                failure_threshold = self.failure_threshold,
                "circuit breaker opened"
            );
        }
    }

    fn record_success(&self) {
        let mut state = self.state.write();
        state.failure_count = state.failure_count.saturating_sub(1);

        // Open is left only through the reset timeout or `reset`.
        if state.failure_count == 0 && state.current == CircuitBreakerState::HalfOpen {
            state.current = CircuitBreakerState::Closed;
            debug!("circuit breaker closed");
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::with_settings(5, Duration::from_secs(60))
    }
}
