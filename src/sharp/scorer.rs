//! Sharp-action scorer
//!
//! `score = Σ wᵢ·cᵢ / Σ wᵢ` over three components, each scaled to [0, 1]:
//! steam count against a saturation point, reverse line movement as 0 or 1,
//! and ticket/money divergence against a saturation point.

use super::types::{SharpActionSignal, SharpIndicators, SharpWeights};
use crate::config::SharpConfig;
use crate::movement::{Direction, ImpactClass, MarketMovement, MovementLog};
use crate::odds::{BettingSplits, GameId, MarketType};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Scorer settings
#[derive(Debug, Clone)]
pub struct SharpScorerConfig {
    /// Trailing window of movements considered
    pub window: Duration,
    pub weights: SharpWeights,
    /// Steam moves at which the steam component reaches 1
    pub steam_saturation: u32,
    /// Divergence at which the divergence component reaches 1
    pub divergence_saturation: Decimal,
}

impl Default for SharpScorerConfig {
    fn default() -> Self {
        Self {
            window: Duration::hours(24),
            weights: SharpWeights::default(),
            steam_saturation: 3,
            divergence_saturation: dec!(0.20),
        }
    }
}

impl From<&SharpConfig> for SharpScorerConfig {
    fn from(config: &SharpConfig) -> Self {
        Self {
            window: Duration::hours(config.window_hours as i64),
            weights: config.weights.clone(),
            steam_saturation: config.steam_saturation,
            divergence_saturation: config.divergence_saturation,
        }
    }
}

fn saturate(value: Decimal, saturation: Decimal) -> Decimal {
    if saturation <= Decimal::ZERO {
        return if value > Decimal::ZERO {
            Decimal::ONE
        } else {
            Decimal::ZERO
        };
    }
    (value / saturation).clamp(Decimal::ZERO, Decimal::ONE)
}

/// Whether, per market, moves went net against the majority ticket side
fn net_reverse_movement(
    movements: &[&Arc<MarketMovement>],
    splits: &BTreeMap<MarketType, BettingSplits>,
) -> bool {
    splits.iter().any(|(market, split)| {
        let Some(majority) = split.majority_side() else {
            return false;
        };
        let net: i64 = movements
            .iter()
            .filter(|m| m.market_type == *market && m.direction != Direction::Neutral)
            .filter_map(|m| m.favored_side())
            .map(|side| if side == majority { 1 } else { -1 })
            .sum();
        net < 0
    })
}

pub struct SharpScorer {
    config: SharpScorerConfig,
    log: Arc<MovementLog>,
}

impl SharpScorer {
    pub fn new(config: SharpScorerConfig, log: Arc<MovementLog>) -> Self {
        Self { config, log }
    }

    pub fn config(&self) -> &SharpScorerConfig {
        &self.config
    }

    /// Score a game from the movement log
    pub fn signal(
        &self,
        game_id: &GameId,
        splits: &BTreeMap<MarketType, BettingSplits>,
        now: DateTime<Utc>,
    ) -> SharpActionSignal {
        let movements = self.log.for_game(game_id, now - self.config.window);
        self.score(game_id, &movements, splits, now)
    }

    /// Score from explicit inputs. Same inputs, same score.
    pub fn score(
        &self,
        game_id: &GameId,
        movements: &[Arc<MarketMovement>],
        splits: &BTreeMap<MarketType, BettingSplits>,
        now: DateTime<Utc>,
    ) -> SharpActionSignal {
        let since = now - self.config.window;
        let in_window: Vec<&Arc<MarketMovement>> = movements
            .iter()
            .filter(|m| &m.game_id == game_id)
            .filter(|m| m.observed_at() >= since && m.observed_at() <= now)
            .collect();

        let steam_moves = in_window
            .iter()
            .filter(|m| m.impact_class == ImpactClass::Steam)
            .count() as u32;
        let reverse_line_movement = in_window
            .iter()
            .any(|m| m.impact_class == ImpactClass::Sharp)
            || net_reverse_movement(&in_window, splits);
        let ticket_money_divergence = splits
            .values()
            .filter_map(BettingSplits::ticket_money_divergence)
            .max();

        let w = &self.config.weights;
        let weights = [
            w.steam.max(Decimal::ZERO),
            w.reverse_line_movement.max(Decimal::ZERO),
            w.ticket_money_divergence.max(Decimal::ZERO),
        ];
        let components = [
            saturate(
                Decimal::from(steam_moves),
                Decimal::from(self.config.steam_saturation),
            ),
            if reverse_line_movement {
                Decimal::ONE
            } else {
                Decimal::ZERO
            },
            ticket_money_divergence
                .map(|d| saturate(d, self.config.divergence_saturation))
                .unwrap_or(Decimal::ZERO),
        ];

        let total_weight: Decimal = weights.iter().copied().sum();
        let score = if total_weight.is_zero() {
            Decimal::ZERO
        } else {
            let weighted: Decimal = weights
                .iter()
                .zip(components.iter())
                .map(|(w, c)| *w * *c)
                .sum();
            (weighted / total_weight).clamp(Decimal::ZERO, Decimal::ONE)
        };

        tracing::debug!(
            game_id = %game_id,
            score = %score.round_dp(4),
            steam_moves,
            reverse_line_movement,
            "Sharp score computed"
        );

        SharpActionSignal {
            game_id: game_id.clone(),
            score,
            indicators: SharpIndicators {
                reverse_line_movement,
                steam_moves,
                ticket_money_divergence,
            },
            computed_at: now,
        }
    }
}
