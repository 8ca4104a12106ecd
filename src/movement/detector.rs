//! Movement detector
//!
//! Diffs each accepted quote against the last one stored for the same
//! (game, book, market) key and classifies the change. The whole
//! compare-and-store step runs under the key's lock, so movements for one key
//! are emitted in acceptance order.

use super::log::MovementLog;
use super::store::{Snapshot, SnapshotStore};
use super::types::{
    Direction, ImpactClass, MarketMovement, MovementBasis, Observation, QuoteRejection,
};
use crate::config::MovementConfig;
use crate::odds::{implied_probability, BettingSplits, MarketType, OddsQuote, Side};
use crate::telemetry::{self, CounterMetric};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Arc;

/// Side priority when picking the side a movement is measured on
const REFERENCE_PRIORITY: [Side; 7] = [
    Side::Home,
    Side::Over,
    Side::Yes,
    Side::Away,
    Side::Under,
    Side::No,
    Side::Draw,
];

/// Detector thresholds
#[derive(Debug, Clone)]
pub struct MovementDetectorConfig {
    /// Implied-probability change at or below which a move is noise
    pub probability_threshold: Decimal,
    /// Line change at or below which a move is noise
    pub line_threshold: Decimal,
    /// Max gap between observations at different books for a steam move
    pub steam_window: Duration,
    /// How long movements stay in the in-memory log
    pub retention: Duration,
}

impl Default for MovementDetectorConfig {
    fn default() -> Self {
        Self {
            probability_threshold: dec!(0.01),
            line_threshold: dec!(0.5),
            steam_window: Duration::minutes(5),
            retention: Duration::hours(24),
        }
    }
}

impl From<&MovementConfig> for MovementDetectorConfig {
    fn from(config: &MovementConfig) -> Self {
        Self {
            probability_threshold: config.probability_threshold,
            line_threshold: config.line_threshold,
            steam_window: Duration::seconds(config.steam_window_secs as i64),
            retention: Duration::hours(config.retention_hours as i64),
        }
    }
}

/// Signed change on the reference side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub reference_side: Side,
    pub basis: MovementBasis,
    pub delta: Decimal,
}

/// Measure the change between two quotes for the same key
///
/// Moneyline uses implied probability. Spread uses the negated line change
/// (a shrinking number favours the side). Total and prop use the line
/// change, negated when measured on Under or No. When the line did not move
/// the probability on the reference side is used instead. `None` when the
/// quotes share no priced side.
pub fn measure(previous: &OddsQuote, current: &OddsQuote) -> Option<Measurement> {
    let side = REFERENCE_PRIORITY.into_iter().find(|s| {
        previous.side_values.contains_key(s) && current.side_values.contains_key(s)
    })?;
    let prev = previous.price(side)?;
    let cur = current.price(side)?;

    if current.market_type != MarketType::Moneyline {
        if let (Some(prev_line), Some(cur_line)) = (prev.line, cur.line) {
            let change = cur_line - prev_line;
            if !change.is_zero() {
                let delta = match (current.market_type, side) {
                    (MarketType::Spread, _) => -change,
                    (_, Side::Under) | (_, Side::No) => -change,
                    _ => change,
                };
                return Some(Measurement {
                    reference_side: side,
                    basis: MovementBasis::Line,
                    delta,
                });
            }
        }
    }

    let delta = implied_probability(cur.odds).ok()? - implied_probability(prev.odds).ok()?;
    Some(Measurement {
        reference_side: side,
        basis: MovementBasis::Probability,
        delta,
    })
}

/// Direction by sign; `|delta| <= threshold` is neutral
pub fn classify_direction(delta: Decimal, threshold: Decimal) -> Direction {
    if delta.abs() <= threshold {
        Direction::Neutral
    } else if delta > Decimal::ZERO {
        Direction::Up
    } else {
        Direction::Down
    }
}

fn same_values(a: &OddsQuote, b: &OddsQuote) -> bool {
    a.side_values == b.side_values
        && a.market_status == b.market_status
        && a.limit_amount == b.limit_amount
}

/// Movement detector over a shared snapshot store and movement log
pub struct MovementDetector {
    config: MovementDetectorConfig,
    store: Arc<SnapshotStore>,
    log: Arc<MovementLog>,
}

impl MovementDetector {
    pub fn new(config: MovementDetectorConfig) -> Self {
        Self::with_store(
            config,
            Arc::new(SnapshotStore::new()),
            Arc::new(MovementLog::new()),
        )
    }

    pub fn with_store(
        config: MovementDetectorConfig,
        store: Arc<SnapshotStore>,
        log: Arc<MovementLog>,
    ) -> Self {
        Self { config, store, log }
    }

    pub fn config(&self) -> &MovementDetectorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn log(&self) -> &Arc<MovementLog> {
        &self.log
    }

    /// Offer a quote. `splits` are the ticket percentages for the quote's
    /// game and market, when the collaborator has them.
    pub fn observe(
        &self,
        quote: OddsQuote,
        splits: Option<&BettingSplits>,
    ) -> Result<Observation, QuoteRejection> {
        let key = quote.key();
        self.store.with_key(&key, |slot| {
            let Some(snapshot) = slot.as_mut() else {
                let quote = Arc::new(quote);
                *slot = Some(Snapshot::new(quote.clone()));
                tracing::debug!(key = %key, "Baseline quote stored");
                return Ok(Observation::Baseline(quote));
            };

            if quote.observed_at < snapshot.last_seen {
                return Err(QuoteRejection::Stale {
                    observed_at: quote.observed_at,
                    latest: snapshot.last_seen,
                });
            }

            let unchanged = same_values(&snapshot.quote, &quote);
            if quote.observed_at == snapshot.last_seen {
                return Err(if unchanged {
                    QuoteRejection::Duplicate
                } else {
                    QuoteRejection::DuplicateConflict
                });
            }
            if unchanged {
                snapshot.last_seen = quote.observed_at;
                return Ok(Observation::Refreshed);
            }

            let previous = snapshot.quote.clone();
            let quote = Arc::new(quote);
            *snapshot = Snapshot::new(quote.clone());

            let movement = if previous.side_values == quote.side_values {
                None
            } else {
                measure(&previous, &quote).map(|m| self.record(&previous, &quote, m, splits))
            };

            Ok(Observation::Updated { quote, movement })
        })
    }

    fn record(
        &self,
        previous: &OddsQuote,
        current: &OddsQuote,
        measurement: Measurement,
        splits: Option<&BettingSplits>,
    ) -> Arc<MarketMovement> {
        let threshold = match measurement.basis {
            MovementBasis::Probability => self.config.probability_threshold,
            MovementBasis::Line => self.config.line_threshold,
        };
        let direction = classify_direction(measurement.delta, threshold);

        let movement = self.log.record_with(&current.game_id, |history| {
            let mut movement = MarketMovement {
                id: uuid::Uuid::new_v4(),
                game_id: current.game_id.clone(),
                sportsbook: current.sportsbook.clone(),
                market_type: current.market_type,
                reference_side: measurement.reference_side,
                basis: measurement.basis,
                previous_quote: previous.quote_ref(),
                current_quote: current.quote_ref(),
                movement_size: measurement.delta,
                direction,
                impact_class: ImpactClass::None,
                detected_at: Utc::now(),
            };
            movement.impact_class = self.classify_impact(&movement, history, splits);
            movement
        });

        telemetry::increment(
            CounterMetric::Movements,
            &[("impact", movement.impact_class.to_string().as_str())],
            1,
        );

        match movement.impact_class {
            ImpactClass::Sharp | ImpactClass::Steam => tracing::info!(
                game_id = %movement.game_id,
                sportsbook = %movement.sportsbook,
                market = %movement.market_type,
                direction = %movement.direction,
                size = %movement.movement_size,
                impact = %movement.impact_class,
                "Market movement"
            ),
            _ => tracing::debug!(
                game_id = %movement.game_id,
                sportsbook = %movement.sportsbook,
                market = %movement.market_type,
                direction = %movement.direction,
                size = %movement.movement_size,
                impact = %movement.impact_class,
                "Market movement"
            ),
        }

        movement
    }

    /// Precedence: below threshold, steam, ticket-based, none
    fn classify_impact(
        &self,
        movement: &MarketMovement,
        history: &[Arc<MarketMovement>],
        splits: Option<&BettingSplits>,
    ) -> ImpactClass {
        if movement.direction == Direction::Neutral {
            return ImpactClass::None;
        }

        let window = self.config.steam_window;
        let observed_at = movement.observed_at();
        let books: HashSet<_> = history
            .iter()
            .filter(|m| {
                m.market_type == movement.market_type
                    && m.sportsbook != movement.sportsbook
                    && m.reference_side == movement.reference_side
                    && m.direction == movement.direction
                    && (m.observed_at() - observed_at).abs() <= window
            })
            .map(|m| &m.sportsbook)
            .collect();
        if !books.is_empty() {
            return ImpactClass::Steam;
        }

        let Some(majority) = splits.and_then(BettingSplits::majority_side) else {
            return ImpactClass::None;
        };
        match movement.favored_side() {
            Some(side) if side == majority => ImpactClass::Public,
            Some(_) => ImpactClass::Sharp,
            None => ImpactClass::None,
        }
    }

    /// Drop log entries past retention
    pub fn prune(&self) -> usize {
        self.log.prune(Utc::now(), self.config.retention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds::{GameId, MarketStatus, SidePrice, Sportsbook};
    use chrono::{DateTime, TimeZone};
    use std::collections::BTreeMap;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_750_000_000 + secs, 0).unwrap()
    }

    fn moneyline(book: &str, home: Decimal, away: Decimal, at: DateTime<Utc>) -> OddsQuote {
        let mut side_values = BTreeMap::new();
        side_values.insert(Side::Home, SidePrice::new(home));
        side_values.insert(Side::Away, SidePrice::new(away));
        OddsQuote {
            game_id: GameId::new("g1"),
            sportsbook: Sportsbook::new(book),
            market_type: MarketType::Moneyline,
            side_values,
            limit_amount: None,
            market_status: MarketStatus::Open,
            observed_at: at,
        }
    }

    fn spread(book: &str, home_line: Decimal, at: DateTime<Utc>) -> OddsQuote {
        let mut side_values = BTreeMap::new();
        side_values.insert(Side::Home, SidePrice::with_line(dec!(-110), home_line));
        side_values.insert(Side::Away, SidePrice::with_line(dec!(-110), -home_line));
        OddsQuote {
            market_type: MarketType::Spread,
            side_values,
            ..moneyline(book, dec!(-110), dec!(-110), at)
        }
    }

    fn splits(home: Decimal) -> BettingSplits {
        let mut s = BettingSplits::default();
        s.tickets.insert(Side::Home, home);
        s.tickets.insert(Side::Away, dec!(100) - home);
        s
    }

    #[test]
    fn test_first_quote_is_baseline() {
        let d = MovementDetector::new(MovementDetectorConfig::default());
        let obs = d
            .observe(moneyline("a", dec!(-150), dec!(130), t(0)), None)
            .unwrap();
        assert!(matches!(obs, Observation::Baseline(_)));
        assert!(d.log().is_empty());
    }

    #[test]
    fn test_duplicate_and_conflict() {
        let d = MovementDetector::new(MovementDetectorConfig::default());
        let q = moneyline("a", dec!(-150), dec!(130), t(0));
        d.observe(q.clone(), None).unwrap();
        assert_eq!(d.observe(q, None).unwrap_err(), QuoteRejection::Duplicate);
        assert_eq!(
            d.observe(moneyline("a", dec!(-160), dec!(140), t(0)), None)
                .unwrap_err(),
            QuoteRejection::DuplicateConflict
        );
        assert!(d.log().is_empty());
    }

    #[test]
    fn test_stale_quote_rejected() {
        let d = MovementDetector::new(MovementDetectorConfig::default());
        d.observe(moneyline("a", dec!(-150), dec!(130), t(60)), None)
            .unwrap();
        let err = d
            .observe(moneyline("a", dec!(-170), dec!(150), t(0)), None)
            .unwrap_err();
        assert!(matches!(err, QuoteRejection::Stale { .. }));
    }

    #[test]
    fn test_unchanged_values_refresh_only() {
        let d = MovementDetector::new(MovementDetectorConfig::default());
        let q = moneyline("a", dec!(-150), dec!(130), t(0));
        let key = q.key();
        d.observe(q, None).unwrap();
        let obs = d
            .observe(moneyline("a", dec!(-150), dec!(130), t(30)), None)
            .unwrap();
        assert!(matches!(obs, Observation::Refreshed));

        let snap = d.store().latest(&key).unwrap();
        assert_eq!(snap.quote.observed_at, t(0));
        assert_eq!(snap.last_seen, t(30));

        // Older than the refresh but newer than the stored quote
        assert!(d
            .observe(moneyline("a", dec!(-150), dec!(130), t(10)), None)
            .is_err());
    }

    #[test]
    fn test_moneyline_movement_up() {
        let d = MovementDetector::new(MovementDetectorConfig::default());
        d.observe(moneyline("a", dec!(-150), dec!(130), t(0)), None)
            .unwrap();
        let obs = d
            .observe(moneyline("a", dec!(-200), dec!(170), t(60)), None)
            .unwrap();
        let m = obs.movement().unwrap();
        assert_eq!(m.reference_side, Side::Home);
        assert_eq!(m.basis, MovementBasis::Probability);
        // 0.6 -> 0.6666..
        assert!(m.movement_size > dec!(0.066) && m.movement_size < dec!(0.067));
        assert_eq!(m.direction, Direction::Up);
        assert_eq!(m.impact_class, ImpactClass::None);
        assert_eq!(m.previous_quote.observed_at, t(0));
        assert_eq!(m.current_quote.observed_at, t(60));
    }

    #[test]
    fn test_threshold_boundary() {
        let d = MovementDetector::new(MovementDetectorConfig::default());
        // +9900 -> 1%, +4900 -> 2%: exactly one point
        d.observe(moneyline("a", dec!(9900), dec!(-20000), t(0)), None)
            .unwrap();
        let obs = d
            .observe(moneyline("a", dec!(4900), dec!(-20000), t(10)), None)
            .unwrap();
        let m = obs.movement().unwrap();
        assert_eq!(m.movement_size, dec!(0.01));
        assert_eq!(m.direction, Direction::Neutral);
        assert_eq!(m.impact_class, ImpactClass::None);

        // 2% -> ~3.01%
        let obs = d
            .observe(moneyline("a", dec!(3222), dec!(-20000), t(20)), None)
            .unwrap();
        let m = obs.movement().unwrap();
        assert!(m.movement_size > dec!(0.01));
        assert_eq!(m.direction, Direction::Up);
    }

    #[test]
    fn test_classify_direction_strict() {
        assert_eq!(classify_direction(dec!(0.01), dec!(0.01)), Direction::Neutral);
        assert_eq!(classify_direction(dec!(-0.01), dec!(0.01)), Direction::Neutral);
        assert_eq!(classify_direction(dec!(0.0101), dec!(0.01)), Direction::Up);
        assert_eq!(classify_direction(dec!(-0.0101), dec!(0.01)), Direction::Down);
    }

    #[test]
    fn test_spread_line_movement() {
        let d = MovementDetector::new(MovementDetectorConfig::default());
        d.observe(spread("a", dec!(-1.5), t(0)), None).unwrap();
        let obs = d.observe(spread("a", dec!(-2.5), t(60)), None).unwrap();
        let m = obs.movement().unwrap();
        assert_eq!(m.basis, MovementBasis::Line);
        assert_eq!(m.movement_size, dec!(1.0));
        assert_eq!(m.direction, Direction::Up);

        // Half a point is within the line threshold
        let obs = d.observe(spread("a", dec!(-2.0), t(120)), None).unwrap();
        assert_eq!(obs.movement().unwrap().direction, Direction::Neutral);
    }

    #[test]
    fn test_sharp_and_public_classification() {
        let d = MovementDetector::new(MovementDetectorConfig::default());
        let public = splits(dec!(75));

        d.observe(moneyline("a", dec!(-150), dec!(130), t(0)), Some(&public))
            .unwrap();
        // Toward home, where the tickets are
        let obs = d
            .observe(moneyline("a", dec!(-200), dec!(170), t(60)), Some(&public))
            .unwrap();
        assert_eq!(obs.movement().unwrap().impact_class, ImpactClass::Public);

        // Back toward away against 75% home tickets
        let obs = d
            .observe(moneyline("a", dec!(-130), dec!(110), t(120)), Some(&public))
            .unwrap();
        assert_eq!(obs.movement().unwrap().impact_class, ImpactClass::Sharp);
    }

    #[test]
    fn test_no_ticket_data_is_none() {
        let d = MovementDetector::new(MovementDetectorConfig::default());
        d.observe(moneyline("a", dec!(-150), dec!(130), t(0)), None)
            .unwrap();
        let obs = d
            .observe(moneyline("a", dec!(-130), dec!(110), t(60)), None)
            .unwrap();
        assert_eq!(obs.movement().unwrap().impact_class, ImpactClass::None);
    }

    #[test]
    fn test_steam_across_books() {
        let d = MovementDetector::new(MovementDetectorConfig::default());
        let public = splits(dec!(75));
        for book in ["a", "b", "c"] {
            d.observe(moneyline(book, dec!(-150), dec!(130), t(0)), None)
                .unwrap();
        }

        let first = d
            .observe(moneyline("a", dec!(-200), dec!(170), t(100)), Some(&public))
            .unwrap();
        assert_eq!(first.movement().unwrap().impact_class, ImpactClass::Public);

        // Second book moves the same way two minutes later: steam wins over public
        let second = d
            .observe(moneyline("b", dec!(-190), dec!(160), t(220)), Some(&public))
            .unwrap();
        assert_eq!(second.movement().unwrap().impact_class, ImpactClass::Steam);

        // Third book outside the window relative to both
        let third = d
            .observe(moneyline("c", dec!(-190), dec!(160), t(1000)), None)
            .unwrap();
        assert_eq!(third.movement().unwrap().impact_class, ImpactClass::None);
    }

    #[test]
    fn test_status_change_without_price_change() {
        let d = MovementDetector::new(MovementDetectorConfig::default());
        d.observe(moneyline("a", dec!(-150), dec!(130), t(0)), None)
            .unwrap();
        let closed = OddsQuote {
            market_status: MarketStatus::Closed,
            ..moneyline("a", dec!(-150), dec!(130), t(60))
        };
        let obs = d.observe(closed, None).unwrap();
        assert!(obs.accepted_quote().is_some());
        assert!(obs.movement().is_none());
    }
}
