//! Normalizers
//!
//! Turn a source's raw payload into canonical [`OddsQuote`](crate::odds::OddsQuote)
//! records. Normalizers are pure: no I/O, no shared state, safe to run
//! concurrently. Everything that differs between sources lives behind
//! [`SourceAdapter`]; the rest of the pipeline never branches on source
//! identity.

mod draft;
mod odds_api;
mod tank01;
mod types;

pub use odds_api::OddsApiAdapter;
pub use tank01::{Tank01Adapter, TANK01_ODDS_PATH};
pub use types::{NormalizeOutcome, ValidationError};

use crate::config::SourceConfig;
use crate::odds::GameId;
use crate::source::{RawPayload, SourceError};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload to canonical quotes
pub trait Normalizer: Send + Sync {
    fn normalize(&self, payload: &RawPayload) -> NormalizeOutcome;
}

/// Everything source-specific: request shape, envelope and parsing
pub trait SourceAdapter: Normalizer {
    /// Build the odds request for one game
    fn build_request(
        &self,
        client: &Client,
        config: &SourceConfig,
        game_id: &GameId,
        api_key: &str,
    ) -> RequestBuilder;

    /// Strip any transport envelope, surfacing in-band errors
    fn unwrap_envelope(&self, body: serde_json::Value) -> Result<serde_json::Value, SourceError> {
        Ok(body)
    }
}

/// Adapter table. Adding a source means adding a variant and an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Tank01,
    OddsApi,
}

impl SourceKind {
    pub fn adapter(self) -> &'static dyn SourceAdapter {
        match self {
            SourceKind::Tank01 => &Tank01Adapter,
            SourceKind::OddsApi => &OddsApiAdapter,
        }
    }
}

impl Normalizer for SourceKind {
    fn normalize(&self, payload: &RawPayload) -> NormalizeOutcome {
        self.adapter().normalize(payload)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Tank01 => f.write_str("tank01"),
            SourceKind::OddsApi => f.write_str("odds_api"),
        }
    }
}
