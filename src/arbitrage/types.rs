//! Arbitrage types

use crate::odds::{GameId, MarketType, Side, Sportsbook};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One side of an arbitrage: the best price for that side across books
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageLeg {
    pub sportsbook: Sportsbook,
    pub side: Side,
    pub odds: Decimal,
    pub line: Option<Decimal>,
    pub implied_probability: Decimal,
}

/// Cross-book arbitrage. Advisory only; recomputed on every scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub game_id: GameId,
    pub market_type: MarketType,
    pub leg_a: ArbitrageLeg,
    pub leg_b: ArbitrageLeg,
    /// Sum of the two legs' implied probabilities (< 1)
    pub implied_sum: Decimal,
    /// `(1 - implied_sum) / implied_sum`
    pub profit_margin: Decimal,
    pub computed_at: DateTime<Utc>,
}

impl ArbitrageOpportunity {
    /// Split `total` across the legs so either outcome returns the same amount
    pub fn stake_split(&self, total: Decimal) -> (Decimal, Decimal) {
        let a = total * self.leg_a.implied_probability / self.implied_sum;
        (a, total - a)
    }

    /// Amount returned (stake included) by either leg under `stake_split`
    pub fn guaranteed_return(&self, total: Decimal) -> Decimal {
        total / self.implied_sum
    }
}
