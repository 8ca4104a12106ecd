//! Sharp-action types

use crate::odds::GameId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Relative weight of each indicator in the composite score
///
/// These are a tuning surface, not validated constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharpWeights {
    #[serde(default = "default_steam_weight")]
    pub steam: Decimal,
    #[serde(default = "default_rlm_weight")]
    pub reverse_line_movement: Decimal,
    #[serde(default = "default_divergence_weight")]
    pub ticket_money_divergence: Decimal,
}

fn default_steam_weight() -> Decimal {
    dec!(0.40)
}
fn default_rlm_weight() -> Decimal {
    dec!(0.35)
}
fn default_divergence_weight() -> Decimal {
    dec!(0.25)
}

impl Default for SharpWeights {
    fn default() -> Self {
        Self {
            steam: default_steam_weight(),
            reverse_line_movement: default_rlm_weight(),
            ticket_money_divergence: default_divergence_weight(),
        }
    }
}

/// Raw indicators behind a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharpIndicators {
    /// Line moved against the majority of tickets
    pub reverse_line_movement: bool,
    /// Steam movements in the window
    pub steam_moves: u32,
    /// Largest money-minus-tickets share on any side, when money data exists
    pub ticket_money_divergence: Option<Decimal>,
}

/// Composite sharp-money signal for one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharpActionSignal {
    pub game_id: GameId,
    /// 0 (no sign of sharp money) to 1
    pub score: Decimal,
    pub indicators: SharpIndicators,
    pub computed_at: DateTime<Utc>,
}
