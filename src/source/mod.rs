//! Source clients
//!
//! One client per external odds source. The [`OddsSource`] trait is the raw
//! transport; [`SourceClient`] adds rate limiting, the circuit breaker and
//! in-flight suppression on top of it.

mod breaker;
mod client;
mod http;
mod limiter;
mod types;

pub use breaker::{BreakerPermit, CircuitBreaker, CircuitBreakerConfig};
pub use client::{SourceClient, SourceClientConfig};
pub use http::HttpSource;
pub use limiter::TokenBucket;
pub use types::{BreakerStatus, RawPayload, SourceError, SourceStats};

use crate::odds::GameId;
use async_trait::async_trait;

/// Raw transport to one odds source
#[async_trait]
pub trait OddsSource: Send + Sync {
    /// Source name used in logs, metrics and as the default sportsbook
    fn name(&self) -> &str;

    /// Fetch the current market payload for one game
    async fn fetch(&self, game_id: &GameId) -> Result<RawPayload, SourceError>;

    /// Install a new auth token
    fn update_credentials(&self, _token: String) {}
}
