//! Circuit breaker to stop hammering a failing story model.
//!
//! When primary generation fails repeatedly, the circuit opens and
//! subsequent calls go straight to the fallback storyteller. After the
//! reset timeout the next call is let through as a trial.
//!
//! ```text
//! Closed   -> Open:     failures >= failure_threshold
//! Open     -> HalfOpen: first execute() after reset_timeout (the trial)
//! HalfOpen -> Closed:   trial succeeds
//! HalfOpen -> Open:     trial fails
//! ```
//!
//! There is no background timer: `Open -> HalfOpen` only happens inside
//! [`CircuitBreaker::execute`]. While a trial is in flight, other calls are
//! short-circuited.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Cooldown before a trial call is allowed (in milliseconds)
    #[serde(rename = "reset_timeout_ms", with = "duration_ms")]
    pub reset_timeout: Duration,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
        }
    }
}

/// State of the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through
    Closed,

    /// Calls go straight to the fallback
    Open,

    /// A trial call is testing the dependency
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Point-in-time view of a breaker, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failures: u32,
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    /// Cooldown left before a trial is allowed, if open.
    pub open_remaining: Option<Duration>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

enum Admission {
    Rejected,
    Pass,
    Trial,
}

/// Guards one remote dependency.
///
/// Share a single instance (behind `Arc`) between all callers of the same
/// dependency. The lock is never held across an `.await`.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker.
    ///
    /// A `failure_threshold` of zero is treated as one.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::named("primary", config)
    }

    /// Create a breaker with a name used in log fields.
    pub fn named(name: impl Into<String>, mut config: CircuitBreakerConfig) -> Self {
        config.failure_threshold = config.failure_threshold.max(1);
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                last_failure: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Run `action` unless the circuit is open, falling back on failure.
    ///
    /// The action's error is recorded and logged, never returned. The result
    /// is always either the action's value or the fallback's value.
    pub async fn execute<T, E, A, AFut, F, FFut>(&self, action: A, fallback: F) -> T
    where
        A: FnOnce() -> AFut,
        AFut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        F: FnOnce() -> FFut,
        FFut: Future<Output = T>,
    {
        let trial = match self.admit() {
            Admission::Rejected => {
                tracing::debug!(breaker = %self.name, "Circuit open, short-circuiting to fallback");
                return fallback().await;
            }
            Admission::Pass => false,
            Admission::Trial => true,
        };

        let mut guard = TrialGuard {
            breaker: self,
            armed: trial,
        };

        match action().await {
            Ok(value) => {
                guard.armed = false;
                self.record_success(trial);
                value
            }
            Err(error) => {
                guard.armed = false;
                tracing::warn!(
                    breaker = %self.name,
                    error = %error,
                    trial,
                    "Guarded call failed, using fallback"
                );
                self.record_failure(trial);
                fallback().await
            }
        }
    }

    /// Current state. No side effects: an open circuit whose cooldown has
    /// elapsed still reports `Open` until the next `execute`.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Consecutive failures since the last success or reset.
    pub fn failures(&self) -> u32 {
        self.inner.lock().failures
    }

    /// Configuration this breaker was built with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        let open_remaining = match (inner.state, inner.last_failure) {
            (CircuitState::Open, Some(at)) => {
                Some(self.config.reset_timeout.saturating_sub(at.elapsed()))
            }
            _ => None,
        };

        CircuitSnapshot {
            state: inner.state,
            failures: inner.failures,
            failure_threshold: self.config.failure_threshold,
            reset_timeout: self.config.reset_timeout,
            open_remaining,
        }
    }

    /// Force the circuit closed and forget past failures.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.last_failure = None;
        inner.trial_in_flight = false;
        tracing::info!(breaker = %self.name, "Circuit manually reset");
    }

    /// State check at the start of every call.
    fn admit(&self) -> Admission {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Admission::Pass,
            CircuitState::HalfOpen if inner.trial_in_flight => Admission::Rejected,
            CircuitState::HalfOpen => {
                inner.trial_in_flight = true;
                Admission::Trial
            }
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .map_or(true, |at| at.elapsed() >= self.config.reset_timeout);
                if !cooled_down || inner.trial_in_flight {
                    return Admission::Rejected;
                }
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = true;
                tracing::info!(breaker = %self.name, "Circuit half-open, allowing trial call");
                Admission::Trial
            }
        }
    }

    fn record_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        let previous = inner.state;
        inner.failures = 0;
        inner.state = CircuitState::Closed;
        inner.trial_in_flight = false;
        if previous != CircuitState::Closed {
            if trial {
                tracing::info!(breaker = %self.name, "Circuit closed after successful trial");
            } else {
                tracing::info!(breaker = %self.name, "Circuit closed by a call admitted before it opened");
            }
        }
    }

    fn record_failure(&self, trial: bool) {
        let mut inner = self.inner.lock();
        inner.failures = inner.failures.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        if trial {
            inner.trial_in_flight = false;
        }

        if inner.failures >= self.config.failure_threshold {
            let previous = inner.state;
            inner.state = CircuitState::Open;
            match Trip::after_failure(previous, trial) {
                Some(Trip::Opened) => tracing::warn!(
                    breaker = %self.name,
                    failures = inner.failures,
                    "Circuit opened after repeated failures"
                ),
                Some(Trip::Reopened) => tracing::warn!(
                    breaker = %self.name,
                    "Circuit reopened after failed trial"
                ),
                None => {}
            }
        }
    }

    /// The trial future was dropped before it finished.
    fn abandon_trial(&self) {
        let mut inner = self.inner.lock();
        inner.trial_in_flight = false;
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Open;
            tracing::debug!(breaker = %self.name, "Trial call abandoned, circuit back to open");
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

/// Transition caused by a failure that reached the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trip {
    Opened,
    Reopened,
}

impl Trip {
    /// Only the trial call itself can reopen the circuit. A call admitted
    /// while closed may finish after the circuit went half-open.
    fn after_failure(previous: CircuitState, trial: bool) -> Option<Trip> {
        match (trial, previous) {
            (true, _) => Some(Trip::Reopened),
            (false, CircuitState::Open) => None,
            (false, _) => Some(Trip::Opened),
        }
    }
}

/// Returns the circuit to `Open` if a trial is cancelled or panics.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_trial();
        }
    }
}
