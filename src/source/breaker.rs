//! Per-source circuit breaker
//!
//! Closed until `failure_threshold` consecutive transient failures, then open
//! for `cooldown`. After the cooldown exactly one trial call is let through
//! (half-open); its success closes the breaker, its failure reopens it with a
//! fresh cooldown. A permit dropped before it is settled frees its trial
//! slot, so a cancelled trial call never wedges the breaker half-open.

use super::types::{BreakerStatus, SourceError};
use crate::config::BreakerConfig;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Breaker thresholds
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Time spent open before a trial call is allowed
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

impl From<&BreakerConfig> for CircuitBreakerConfig {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            cooldown: Duration::from_secs(config.cooldown_secs),
        }
    }
}

impl CircuitBreakerConfig {
    #[must_use]
    pub fn with_failure_threshold(mut self, failures: u32) -> Self {
        self.failure_threshold = failures;
        self
    }

    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { trial_in_flight: bool },
}

/// Permission to make one call. Settled with `record_success` or
/// `record_failure`; anything else (including drop) counts as a release.
#[derive(Debug)]
#[must_use]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl BreakerPermit<'_> {
    pub fn is_trial(&self) -> bool {
        self.trial
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.free_trial();
        }
    }
}

/// Consecutive-failure circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    /// Ask to make a call at `now`
    pub fn try_acquire(&self, now: Instant) -> Result<BreakerPermit<'_>, SourceError> {
        let mut state = self.state.lock();
        match *state {
            BreakerState::Closed { .. } => Ok(self.permit(false)),
            BreakerState::Open { opened_at } => {
                if now.saturating_duration_since(opened_at) >= self.config.cooldown {
                    *state = BreakerState::HalfOpen {
                        trial_in_flight: true,
                    };
                    tracing::info!(source = %self.name, "Circuit breaker half-open, allowing trial call");
                    Ok(self.permit(true))
                } else {
                    Err(SourceError::CircuitOpen)
                }
            }
            BreakerState::HalfOpen { trial_in_flight } => {
                if trial_in_flight {
                    Err(SourceError::CircuitOpen)
                } else {
                    *state = BreakerState::HalfOpen {
                        trial_in_flight: true,
                    };
                    Ok(self.permit(true))
                }
            }
        }
    }

    fn permit(&self, trial: bool) -> BreakerPermit<'_> {
        BreakerPermit {
            breaker: self,
            trial,
            settled: false,
        }
    }

    /// The call reached the source and got an answer
    pub fn record_success(&self, mut permit: BreakerPermit<'_>) {
        permit.settled = true;
        let mut state = self.state.lock();
        if !matches!(*state, BreakerState::Closed { .. }) {
            tracing::info!(source = %self.name, "Circuit breaker closed");
        }
        *state = BreakerState::Closed {
            consecutive_failures: 0,
        };
    }

    /// The call failed in a way that counts toward the threshold
    pub fn record_failure(&self, mut permit: BreakerPermit<'_>, now: Instant) {
        permit.settled = true;
        let mut state = self.state.lock();
        match *state {
            BreakerState::Closed {
                consecutive_failures,
            } => {
                let failures = consecutive_failures + 1;
                if failures >= self.config.failure_threshold {
                    tracing::warn!(
                        source = %self.name,
                        failures,
                        cooldown_secs = self.config.cooldown.as_secs(),
                        "Circuit breaker opened"
                    );
                    *state = BreakerState::Open { opened_at: now };
                } else {
                    *state = BreakerState::Closed {
                        consecutive_failures: failures,
                    };
                }
            }
            BreakerState::HalfOpen { .. } if permit.trial => {
                tracing::warn!(source = %self.name, "Trial call failed, circuit breaker reopened");
                *state = BreakerState::Open { opened_at: now };
            }
            // Late failure from a call started before the breaker tripped
            _ => {}
        }
    }

    /// The call ended without telling us anything about source health
    /// (rate limited locally, auth failure). Frees a half-open trial slot.
    pub fn release(&self, permit: BreakerPermit<'_>) {
        drop(permit);
    }

    fn free_trial(&self) {
        let mut state = self.state.lock();
        if let BreakerState::HalfOpen { .. } = *state {
            *state = BreakerState::HalfOpen {
                trial_in_flight: false,
            };
        }
    }

    /// Force the breaker closed
    pub fn reset(&self) {
        *self.state.lock() = BreakerState::Closed {
            consecutive_failures: 0,
        };
    }

    pub fn status(&self) -> BreakerStatus {
        match *self.state.lock() {
            BreakerState::Closed { .. } => BreakerStatus::Closed,
            BreakerState::Open { .. } => BreakerStatus::Open,
            BreakerState::HalfOpen { .. } => BreakerStatus::HalfOpen,
        }
    }
}
