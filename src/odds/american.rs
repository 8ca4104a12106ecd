//! American odds math
//!
//! Sign convention: positive odds are the profit on a $100 stake, negative
//! odds are the stake required to profit $100.

use super::types::{ComputationError, OddsQuote, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

fn validate(odds: Decimal) -> Result<(), ComputationError> {
    if odds.is_zero() {
        return Err(ComputationError::ZeroOdds);
    }
    if odds.abs() < dec!(100) {
        return Err(ComputationError::OddsOutOfRange(odds));
    }
    Ok(())
}

/// Break-even win probability for an American price
///
/// - `odds > 0`: `100 / (odds + 100)`
/// - `odds < 0`: `|odds| / (|odds| + 100)`
pub fn implied_probability(odds: Decimal) -> Result<Decimal, ComputationError> {
    validate(odds)?;
    if odds > Decimal::ZERO {
        Ok(dec!(100) / (odds + dec!(100)))
    } else {
        let abs = odds.abs();
        Ok(abs / (abs + dec!(100)))
    }
}

/// American price for a probability. `favorite` selects the negative form;
/// at exactly 0.5 both forms are ±100.
pub fn american_from_probability(
    probability: Decimal,
    favorite: bool,
) -> Result<Decimal, ComputationError> {
    if probability <= Decimal::ZERO || probability >= Decimal::ONE {
        return Err(ComputationError::ProbabilityOutOfRange(probability));
    }
    let complement = Decimal::ONE - probability;
    if favorite {
        Ok(-(dec!(100) * probability / complement))
    } else {
        Ok(dec!(100) * complement / probability)
    }
}

/// Profit returned by a winning `stake` at `odds` (stake not included)
pub fn payout_for_stake(odds: Decimal, stake: Decimal) -> Result<Decimal, ComputationError> {
    validate(odds)?;
    if odds > Decimal::ZERO {
        Ok(stake * odds / dec!(100))
    } else {
        Ok(stake * dec!(100) / odds.abs())
    }
}

/// Derived metrics for one quote. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpliedMetrics {
    /// Implied probability per valid side
    pub probabilities: BTreeMap<Side, Decimal>,
    /// Sum of implied probabilities across valid sides
    pub market_efficiency: Decimal,
    /// Bookmaker margin in percent: `(efficiency - 1) * 100`
    pub vig_pct: Decimal,
    /// Sides left out because their price could not be converted
    pub excluded: Vec<(Side, ComputationError)>,
}

impl ImpliedMetrics {
    /// Compute metrics for a quote. Invalid sides are excluded rather than
    /// failing the whole quote. A complete two-sided quote whose efficiency
    /// is below 1.0 is a data error and returns `NegativeVig`.
    pub fn from_quote(quote: &OddsQuote) -> Result<Self, ComputationError> {
        let mut probabilities = BTreeMap::new();
        let mut excluded = Vec::new();

        for (side, price) in &quote.side_values {
            match implied_probability(price.odds) {
                Ok(p) => {
                    probabilities.insert(*side, p);
                }
                Err(e) => excluded.push((*side, e)),
            }
        }

        let market_efficiency: Decimal = probabilities.values().copied().sum();
        let complete_pair = probabilities.keys().any(|side| {
            side.opposite()
                .map(|o| probabilities.contains_key(&o))
                .unwrap_or(false)
        });

        if complete_pair && excluded.is_empty() && market_efficiency < Decimal::ONE {
            return Err(ComputationError::NegativeVig(market_efficiency));
        }

        Ok(Self {
            probabilities,
            market_efficiency,
            vig_pct: (market_efficiency - Decimal::ONE) * dec!(100),
            excluded,
        })
    }

    pub fn probability(&self, side: Side) -> Option<Decimal> {
        self.probabilities.get(&side).copied()
    }
}
