//! Normalizer types

use crate::odds::{MarketType, OddsQuote, Side};
use rust_decimal::Decimal;
use thiserror::Error;

/// A record or side the normalizer refused. Counted and logged, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("unexpected payload shape: {0}")]
    UnexpectedShape(String),

    #[error("cannot parse `{value}` for `{field}`")]
    Unparseable { field: &'static str, value: String },

    #[error("implausible odds {odds} for {side} in {market}")]
    ImplausibleOdds {
        market: MarketType,
        side: Side,
        odds: Decimal,
    },

    #[error("no valid sides left for {market}")]
    NoValidSides { market: MarketType },

    #[error("unknown outcome `{name}` in {market}")]
    UnknownOutcome { market: MarketType, name: String },
}

/// Result of normalizing one payload
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    pub quotes: Vec<OddsQuote>,
    pub rejected: Vec<ValidationError>,
}

impl NormalizeOutcome {
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty() && self.rejected.is_empty()
    }
}
