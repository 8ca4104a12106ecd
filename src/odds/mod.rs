//! Canonical odds model
//!
//! Source-independent representation of a sportsbook price snapshot plus the
//! American-odds math every downstream component relies on.

mod american;
mod types;

pub use american::{
    american_from_probability, implied_probability, payout_for_stake, ImpliedMetrics,
};
pub use types::{
    BettingSplits, ComputationError, GameId, MarketStatus, MarketType, OddsQuote, QuoteKey,
    QuoteRef, Side, SidePrice, Sportsbook,
};
