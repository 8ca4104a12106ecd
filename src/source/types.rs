//! Source client types

use crate::odds::GameId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Undecoded source response for one game, after the transport envelope has
/// been removed
#[derive(Debug, Clone)]
pub struct RawPayload {
    /// Name of the source that produced it
    pub source: String,
    pub game_id: GameId,
    pub body: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

/// Fetch failures. None of these are fatal; each is scoped to one
/// (source, game) and retried on the next tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// No token available locally, or the source answered 429
    #[error("rate limited")]
    RateLimited,

    /// Credentials rejected; the (source, game) stays degraded until refreshed
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// Connect error, timeout or 5xx; counts toward the breaker threshold
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Response could not be decoded
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Breaker open, no network attempt was made
    #[error("circuit breaker open")]
    CircuitOpen,

    /// A fetch for the same game is still outstanding
    #[error("fetch already in flight")]
    InFlight,

    /// Game marked degraded for this source after an auth failure
    #[error("degraded pending credential refresh")]
    Degraded,
}

impl SourceError {
    /// Metric label for this outcome
    pub fn label(&self) -> &'static str {
        match self {
            SourceError::RateLimited => "rate_limited",
            SourceError::AuthFailure(_) => "auth_failure",
            SourceError::TransientNetwork(_) => "transient_network",
            SourceError::MalformedResponse(_) => "malformed_response",
            SourceError::CircuitOpen => "circuit_open",
            SourceError::InFlight => "in_flight",
            SourceError::Degraded => "degraded",
        }
    }
}

/// Externally visible breaker position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BreakerStatus::Closed => "closed",
            BreakerStatus::Open => "open",
            BreakerStatus::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Point-in-time health snapshot of one source
#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub source: String,
    /// Fetches that reached the network
    pub attempts: u64,
    pub successes: u64,
    pub rate_limited: u64,
    pub auth_failures: u64,
    pub transient_failures: u64,
    pub malformed: u64,
    /// Calls rejected by the breaker without network I/O
    pub circuit_rejections: u64,
    /// Ticks skipped because the previous fetch was still running
    pub in_flight_skips: u64,
    /// Games whose last fetch failed authentication
    pub degraded_games: usize,
    pub breaker: BreakerStatus,
}
