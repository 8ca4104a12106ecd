//! Per-source token bucket

use super::types::SourceError;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

/// Token bucket that never waits. A call without a token is deferred to the
/// next tick by the caller, so there is no backlog to drain.
pub struct TokenBucket {
    limiter: DefaultDirectRateLimiter,
}

impl TokenBucket {
    /// `requests_per_minute` sustained, up to `burst` back-to-back calls
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(rate).allow_burst(burst);
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Take a token if one is available
    pub fn check(&self) -> Result<(), SourceError> {
        self.limiter.check().map_err(|_| SourceError::RateLimited)
    }
}
