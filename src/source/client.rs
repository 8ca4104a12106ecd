//! Protected source client
//!
//! Wraps an [`OddsSource`] with the rate limiter, circuit breaker, in-flight
//! suppression and call timeout. Every failure stays scoped to the source and
//! game that produced it.

use super::breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::limiter::TokenBucket;
use super::types::{RawPayload, SourceError, SourceStats};
use super::OddsSource;
use crate::config::{BreakerConfig, SourceConfig};
use crate::odds::GameId;
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use dashmap::DashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Client-side protection settings for one source
#[derive(Debug, Clone)]
pub struct SourceClientConfig {
    pub requests_per_minute: u32,
    pub burst: u32,
    /// Per-call timeout; expiry counts as `TransientNetwork`
    pub call_timeout: Duration,
    pub breaker: CircuitBreakerConfig,
}

impl Default for SourceClientConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst: 5,
            call_timeout: Duration::from_secs(10),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl SourceClientConfig {
    /// Per-source limits with the shared breaker settings
    pub fn from_config(source: &SourceConfig, breaker: &BreakerConfig) -> Self {
        Self {
            requests_per_minute: source.requests_per_minute,
            burst: source.burst,
            call_timeout: Duration::from_secs(source.timeout_secs),
            breaker: CircuitBreakerConfig::from(breaker),
        }
    }
}

#[derive(Default)]
struct Counters {
    attempts: AtomicU64,
    successes: AtomicU64,
    rate_limited: AtomicU64,
    auth_failures: AtomicU64,
    transient_failures: AtomicU64,
    malformed: AtomicU64,
    circuit_rejections: AtomicU64,
    in_flight_skips: AtomicU64,
}

/// Removes the game from the in-flight set when the fetch ends, including
/// when the fetching task is dropped mid-call.
struct InFlightGuard<'a> {
    set: &'a DashSet<GameId>,
    game_id: GameId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.game_id);
    }
}

/// Rate-limited, breaker-protected client for one source
pub struct SourceClient {
    source: Arc<dyn OddsSource>,
    limiter: TokenBucket,
    breaker: CircuitBreaker,
    in_flight: DashSet<GameId>,
    /// Games whose credentials were rejected, until the next refresh
    degraded: DashSet<GameId>,
    call_timeout: Duration,
    counters: Counters,
}

impl SourceClient {
    pub fn new(source: Arc<dyn OddsSource>, config: SourceClientConfig) -> Self {
        let name = source.name().to_string();
        Self {
            limiter: TokenBucket::new(config.requests_per_minute, config.burst),
            breaker: CircuitBreaker::new(name, config.breaker),
            source,
            in_flight: DashSet::new(),
            degraded: DashSet::new(),
            call_timeout: config.call_timeout,
            counters: Counters::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn is_degraded(&self, game_id: &GameId) -> bool {
        self.degraded.contains(game_id)
    }

    /// Fetch the raw payload for one game
    ///
    /// Check order: degraded, in-flight, breaker, rate limit. Only a call
    /// that passes all four touches the network.
    pub async fn fetch(&self, game_id: &GameId) -> Result<RawPayload, SourceError> {
        let result = self.fetch_inner(game_id).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.label(),
        };
        telemetry::increment(
            CounterMetric::Fetch,
            &[("source", self.name()), ("outcome", outcome)],
            1,
        );
        result
    }

    async fn fetch_inner(&self, game_id: &GameId) -> Result<RawPayload, SourceError> {
        if self.is_degraded(game_id) {
            return Err(SourceError::Degraded);
        }

        if !self.in_flight.insert(game_id.clone()) {
            self.counters.in_flight_skips.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(source = %self.name(), game_id = %game_id, "Fetch still in flight, skipping tick");
            return Err(SourceError::InFlight);
        }
        let _guard = InFlightGuard {
            set: &self.in_flight,
            game_id: game_id.clone(),
        };

        let permit = match self.breaker.try_acquire(Instant::now()) {
            Ok(permit) => permit,
            Err(e) => {
                self.counters.circuit_rejections.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        if let Err(e) = self.limiter.check() {
            self.breaker.release(permit);
            self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(source = %self.name(), game_id = %game_id, "No rate-limit token, deferring to next tick");
            return Err(e);
        }

        self.counters.attempts.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let result = match tokio::time::timeout(self.call_timeout, self.source.fetch(game_id)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::TransientNetwork(format!(
                "call timed out after {}s",
                self.call_timeout.as_secs()
            ))),
        };
        telemetry::record_latency(LatencyMetric::Fetch, self.name(), started.elapsed());

        match &result {
            Ok(_) => {
                self.counters.successes.fetch_add(1, Ordering::Relaxed);
                self.breaker.record_success(permit);
            }
            Err(SourceError::MalformedResponse(reason)) => {
                // The source answered; only the content was bad
                self.counters.malformed.fetch_add(1, Ordering::Relaxed);
                self.breaker.record_success(permit);
                tracing::warn!(source = %self.name(), game_id = %game_id, reason = %reason, "Malformed response");
            }
            Err(SourceError::TransientNetwork(reason)) => {
                self.counters.transient_failures.fetch_add(1, Ordering::Relaxed);
                self.breaker.record_failure(permit, Instant::now());
                tracing::warn!(source = %self.name(), game_id = %game_id, reason = %reason, "Transient fetch failure");
            }
            Err(SourceError::AuthFailure(reason)) => {
                self.counters.auth_failures.fetch_add(1, Ordering::Relaxed);
                self.breaker.release(permit);
                if self.degraded.insert(game_id.clone()) {
                    tracing::warn!(source = %self.name(), game_id = %game_id, reason = %reason, "Authentication failed, game degraded until credentials are refreshed");
                }
            }
            Err(SourceError::RateLimited) => {
                self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
                self.breaker.release(permit);
                tracing::warn!(source = %self.name(), game_id = %game_id, "Source rate limited the request");
            }
            Err(_) => self.breaker.release(permit),
        }

        result
    }

    /// Install new credentials, clear every degraded game and close the breaker
    pub fn refresh_credentials(&self, token: String) {
        self.source.update_credentials(token);
        self.breaker.reset();
        let restored = self.degraded.len();
        self.degraded.clear();
        if restored > 0 {
            tracing::info!(source = %self.name(), restored, "Credentials refreshed, degraded games restored");
        }
    }

    pub fn stats(&self) -> SourceStats {
        let c = &self.counters;
        SourceStats {
            source: self.name().to_string(),
            attempts: c.attempts.load(Ordering::Relaxed),
            successes: c.successes.load(Ordering::Relaxed),
            rate_limited: c.rate_limited.load(Ordering::Relaxed),
            auth_failures: c.auth_failures.load(Ordering::Relaxed),
            transient_failures: c.transient_failures.load(Ordering::Relaxed),
            malformed: c.malformed.load(Ordering::Relaxed),
            circuit_rejections: c.circuit_rejections.load(Ordering::Relaxed),
            in_flight_skips: c.in_flight_skips.load(Ordering::Relaxed),
            degraded_games: self.degraded.len(),
            breaker: self.breaker.status(),
        }
    }
}
