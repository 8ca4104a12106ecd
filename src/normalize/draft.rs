//! Quote assembly shared by all adapters

use super::types::ValidationError;
use crate::odds::{GameId, MarketStatus, MarketType, OddsQuote, Side, SidePrice, Sportsbook};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Quote under construction. Sides with implausible prices are dropped and
/// reported; a market where every attempted side was dropped is rejected.
pub(crate) struct QuoteDraft {
    game_id: GameId,
    sportsbook: Sportsbook,
    market_type: MarketType,
    market_status: MarketStatus,
    observed_at: DateTime<Utc>,
    side_values: BTreeMap<Side, SidePrice>,
    attempted: bool,
}

impl QuoteDraft {
    pub fn new(
        game_id: GameId,
        sportsbook: Sportsbook,
        market_type: MarketType,
        market_status: MarketStatus,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            game_id,
            sportsbook,
            market_type,
            market_status,
            observed_at,
            side_values: BTreeMap::new(),
            attempted: false,
        }
    }

    /// Add one side. `odds: None` means the source does not quote it.
    pub fn side(
        &mut self,
        side: Side,
        odds: Option<Decimal>,
        line: Option<Decimal>,
        rejected: &mut Vec<ValidationError>,
    ) {
        let Some(odds) = odds else {
            return;
        };
        self.attempted = true;
        if odds.is_zero() || odds.abs() < dec!(100) {
            rejected.push(ValidationError::ImplausibleOdds {
                market: self.market_type,
                side,
                odds,
            });
            return;
        }
        self.side_values.insert(side, SidePrice { odds, line });
    }

    /// Record that a side was present but unusable
    pub fn mark_attempted(&mut self) {
        self.attempted = true;
    }

    pub fn finish(self, rejected: &mut Vec<ValidationError>) -> Option<OddsQuote> {
        if self.side_values.is_empty() {
            if self.attempted {
                rejected.push(ValidationError::NoValidSides {
                    market: self.market_type,
                });
            }
            return None;
        }
        Some(OddsQuote {
            game_id: self.game_id,
            sportsbook: self.sportsbook,
            market_type: self.market_type,
            side_values: self.side_values,
            limit_amount: None,
            market_status: self.market_status,
            observed_at: self.observed_at,
        })
    }
}

/// Parse a loosely formatted number: `"-150"`, `"+130"`, `"8.5"`, `"EVEN"`.
/// Blank values mean "not quoted".
pub(crate) fn parse_loose_decimal(
    field: &'static str,
    raw: &str,
) -> Result<Option<Decimal>, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed.eq_ignore_ascii_case("n/a") {
        return Ok(None);
    }
    if trimmed.eq_ignore_ascii_case("even") || trimmed.eq_ignore_ascii_case("ev") {
        return Ok(Some(dec!(100)));
    }
    if trimmed.eq_ignore_ascii_case("pk") {
        return Ok(Some(Decimal::ZERO));
    }
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    Decimal::from_str(unsigned)
        .or_else(|_| Decimal::from_scientific(unsigned))
        .map(Some)
        .map_err(|_| ValidationError::Unparseable {
            field,
            value: raw.to_string(),
        })
}
