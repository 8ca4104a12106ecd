//! Cross-book arbitrage scanner
//!
//! For each two-sided market of a game, take the best price per side across
//! all fresh, open quotes and check whether the implied probabilities sum to
//! less than one. Read-only over the snapshot store.

use super::types::{ArbitrageLeg, ArbitrageOpportunity};
use crate::config::ArbitrageConfig;
use crate::movement::{Snapshot, SnapshotStore};
use crate::odds::{ComputationError, GameId, ImpliedMetrics, MarketType, OddsQuote, Side};
use crate::telemetry::{self, CounterMetric};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Opposing side pairs that can form an arbitrage
const SIDE_PAIRS: [(Side, Side); 3] = [
    (Side::Home, Side::Away),
    (Side::Over, Side::Under),
    (Side::Yes, Side::No),
];

/// Scanner thresholds
#[derive(Debug, Clone)]
pub struct ArbitrageScannerConfig {
    /// Quotes not confirmed within this age are ignored
    pub max_quote_age: Duration,
    /// Opportunities at or below this margin are not reported
    pub min_profit_margin: Decimal,
}

impl Default for ArbitrageScannerConfig {
    fn default() -> Self {
        Self {
            max_quote_age: Duration::minutes(10),
            min_profit_margin: dec!(0.02),
        }
    }
}

impl From<&ArbitrageConfig> for ArbitrageScannerConfig {
    fn from(config: &ArbitrageConfig) -> Self {
        Self {
            max_quote_age: Duration::seconds(config.max_quote_age_secs as i64),
            min_profit_margin: config.min_profit_margin,
        }
    }
}

/// Line on the first side's scale: spread legs pair home -L with away +L
fn pairing_line(market: MarketType, side: Side, line: Option<Decimal>) -> Option<Decimal> {
    match (market, side) {
        (MarketType::Spread, Side::Away) => line.map(|l| -l),
        _ => line,
    }
}

/// Best (lowest implied probability) leg per side and line
type BestLegs = BTreeMap<(Side, Option<Decimal>), ArbitrageLeg>;

fn offer(best: &mut BestLegs, key: (Side, Option<Decimal>), leg: ArbitrageLeg) {
    match best.get(&key) {
        Some(current)
            if current.implied_probability < leg.implied_probability
                || (current.implied_probability == leg.implied_probability
                    && current.sportsbook <= leg.sportsbook) => {}
        _ => {
            best.insert(key, leg);
        }
    }
}

/// Scan a set of snapshots for one game
pub fn scan_quotes(
    game_id: &GameId,
    snapshots: &[Snapshot],
    config: &ArbitrageScannerConfig,
    now: DateTime<Utc>,
) -> Vec<ArbitrageOpportunity> {
    let mut by_market: BTreeMap<MarketType, Vec<&OddsQuote>> = BTreeMap::new();
    for snapshot in snapshots {
        let quote = snapshot.quote.as_ref();
        if &quote.game_id != game_id || !quote.is_open() {
            continue;
        }
        if now - snapshot.last_seen >= config.max_quote_age {
            continue;
        }
        by_market.entry(quote.market_type).or_default().push(quote);
    }

    let mut opportunities = Vec::new();
    for (market_type, quotes) in by_market {
        let mut best = BestLegs::new();
        for quote in quotes {
            // Two-leg arbitrage does not cover a three-way market
            if quote.side_values.contains_key(&Side::Draw) {
                continue;
            }
            let metrics = match ImpliedMetrics::from_quote(quote) {
                Ok(metrics) => metrics,
                Err(ComputationError::NegativeVig(efficiency)) => {
                    tracing::warn!(
                        game_id = %quote.game_id,
                        sportsbook = %quote.sportsbook,
                        market = %quote.market_type,
                        efficiency = %efficiency,
                        "Single-book efficiency below 1.0, excluding quote"
                    );
                    continue;
                }
                Err(e) => {
                    tracing::warn!(sportsbook = %quote.sportsbook, error = %e, "Excluding quote");
                    continue;
                }
            };
            for (side, probability) in &metrics.probabilities {
                let Some(price) = quote.price(*side) else {
                    continue;
                };
                let leg = ArbitrageLeg {
                    sportsbook: quote.sportsbook.clone(),
                    side: *side,
                    odds: price.odds,
                    line: price.line,
                    implied_probability: *probability,
                };
                offer(
                    &mut best,
                    (*side, pairing_line(market_type, *side, price.line)),
                    leg,
                );
            }
        }

        for (side_a, side_b) in SIDE_PAIRS {
            for ((side, line), leg_a) in best.range((side_a, None)..) {
                if *side != side_a {
                    break;
                }
                let Some(leg_b) = best.get(&(side_b, *line)) else {
                    continue;
                };
                if let Some(opp) = evaluate(game_id, market_type, leg_a, leg_b, config, now) {
                    opportunities.push(opp);
                }
            }
        }
    }
    opportunities
}

fn evaluate(
    game_id: &GameId,
    market_type: MarketType,
    leg_a: &ArbitrageLeg,
    leg_b: &ArbitrageLeg,
    config: &ArbitrageScannerConfig,
    now: DateTime<Utc>,
) -> Option<ArbitrageOpportunity> {
    let implied_sum = leg_a.implied_probability + leg_b.implied_probability;
    if implied_sum >= Decimal::ONE || implied_sum <= Decimal::ZERO {
        return None;
    }
    if leg_a.sportsbook == leg_b.sportsbook {
        tracing::warn!(
            game_id = %game_id,
            sportsbook = %leg_a.sportsbook,
            market = %market_type,
            "Same-book arbitrage ignored as a data error"
        );
        return None;
    }
    let profit_margin = (Decimal::ONE - implied_sum) / implied_sum;
    if profit_margin <= config.min_profit_margin {
        return None;
    }
    Some(ArbitrageOpportunity {
        game_id: game_id.clone(),
        market_type,
        leg_a: leg_a.clone(),
        leg_b: leg_b.clone(),
        implied_sum,
        profit_margin,
        computed_at: now,
    })
}

/// Arbitrage scanner over the live snapshot store
pub struct ArbitrageScanner {
    config: ArbitrageScannerConfig,
    store: Arc<SnapshotStore>,
}

impl ArbitrageScanner {
    pub fn new(config: ArbitrageScannerConfig, store: Arc<SnapshotStore>) -> Self {
        Self { config, store }
    }

    /// Current opportunities for one game
    pub fn scan(&self, game_id: &GameId, now: DateTime<Utc>) -> Vec<ArbitrageOpportunity> {
        let snapshots = self.store.snapshots_for_game(game_id);
        let found = scan_quotes(game_id, &snapshots, &self.config, now);
        for opp in &found {
            tracing::info!(
                game_id = %opp.game_id,
                market = %opp.market_type,
                leg_a = %format!("{} {} {}", opp.leg_a.sportsbook, opp.leg_a.side, opp.leg_a.odds),
                leg_b = %format!("{} {} {}", opp.leg_b.sportsbook, opp.leg_b.side, opp.leg_b.odds),
                margin = %opp.profit_margin.round_dp(4),
                "Arbitrage opportunity"
            );
        }
        if !found.is_empty() {
            telemetry::increment(CounterMetric::ArbitrageFound, &[], found.len() as u64);
        }
        found
    }
}
