//! Integration tests for snapshot deduplication and movement detection

use crate::support::{moneyline, t0, two_sided};
use chrono::Duration;
use odds_pipeline::movement::{
    Direction, ImpactClass, MovementBasis, MovementDetector, MovementDetectorConfig, Observation,
    QuoteRejection,
};
use odds_pipeline::odds::{BettingSplits, GameId, MarketType, Side};
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

fn detector() -> MovementDetector {
    MovementDetector::new(MovementDetectorConfig::default())
}

#[test]
fn test_identical_quote_is_stored_once() {
    let detector = detector();
    let quote = moneyline("g1", "dk", dec!(-150), dec!(130), t0());

    assert!(matches!(
        detector.observe(quote.clone(), None),
        Ok(Observation::Baseline(_))
    ));
    assert_eq!(
        detector.observe(quote, None).unwrap_err(),
        QuoteRejection::Duplicate
    );
    assert_eq!(detector.store().len(), 1);
    assert!(detector.log().is_empty());
}

#[test]
fn test_stale_and_conflicting_quotes_rejected() {
    let detector = detector();
    detector
        .observe(moneyline("g1", "dk", dec!(-150), dec!(130), t0()), None)
        .unwrap();

    let conflict = detector
        .observe(moneyline("g1", "dk", dec!(-160), dec!(140), t0()), None)
        .unwrap_err();
    assert_eq!(conflict, QuoteRejection::DuplicateConflict);

    let stale = detector
        .observe(
            moneyline("g1", "dk", dec!(-170), dec!(150), t0() - Duration::minutes(1)),
            None,
        )
        .unwrap_err();
    assert!(matches!(stale, QuoteRejection::Stale { .. }));

    let latest = detector
        .store()
        .latest(&moneyline("g1", "dk", dec!(-150), dec!(130), t0()).key())
        .unwrap();
    assert_eq!(latest.quote.price(Side::Home).unwrap().odds, dec!(-150));
}

#[test]
fn test_refresh_updates_freshness_only() {
    let detector = detector();
    let quote = moneyline("g1", "dk", dec!(-150), dec!(130), t0());
    let key = quote.key();
    detector.observe(quote.clone(), None).unwrap();

    let mut later = quote;
    later.observed_at = t0() + Duration::minutes(2);
    assert!(matches!(
        detector.observe(later, None),
        Ok(Observation::Refreshed)
    ));

    let snapshot = detector.store().latest(&key).unwrap();
    assert_eq!(snapshot.quote.observed_at, t0());
    assert_eq!(snapshot.last_seen, t0() + Duration::minutes(2));
}

#[test]
fn test_probability_threshold_boundary() {
    // +1900 is 5% and +2400 is 4%: exactly one point of probability
    let detector = detector();
    detector
        .observe(moneyline("g1", "dk", dec!(1900), dec!(-5000), t0()), None)
        .unwrap();
    let observation = detector
        .observe(
            moneyline("g1", "dk", dec!(2400), dec!(-5000), t0() + Duration::minutes(1)),
            None,
        )
        .unwrap();
    let movement = observation.movement().unwrap();
    assert_eq!(movement.movement_size, dec!(-0.01));
    assert_eq!(movement.direction, Direction::Neutral);
    assert_eq!(movement.impact_class, ImpactClass::None);

    // +2500 is past the threshold
    let observation = detector
        .observe(
            moneyline("g1", "dk", dec!(2500), dec!(-5000), t0() + Duration::minutes(2)),
            None,
        )
        .unwrap();
    assert_eq!(observation.movement().unwrap().direction, Direction::Down);
}

#[test]
fn test_steam_across_books() {
    let detector = detector();
    for book in ["book_a", "book_b"] {
        detector
            .observe(moneyline("g1", book, dec!(-150), dec!(130), t0()), None)
            .unwrap();
    }

    let first = detector
        .observe(
            moneyline("g1", "book_a", dec!(-175), dec!(155), t0() + Duration::minutes(1)),
            None,
        )
        .unwrap();
    assert_eq!(first.movement().unwrap().impact_class, ImpactClass::None);

    let second = detector
        .observe(
            moneyline("g1", "book_b", dec!(-180), dec!(160), t0() + Duration::minutes(3)),
            None,
        )
        .unwrap();
    let movement = second.movement().unwrap();
    assert_eq!(movement.direction, Direction::Up);
    assert_eq!(movement.impact_class, ImpactClass::Steam);
    assert_eq!(detector.log().for_game(&GameId::new("g1"), t0()).len(), 2);
}

#[test]
fn test_steam_window_expires() {
    let detector = detector();
    for book in ["book_a", "book_b"] {
        detector
            .observe(moneyline("g1", book, dec!(-150), dec!(130), t0()), None)
            .unwrap();
    }
    detector
        .observe(
            moneyline("g1", "book_a", dec!(-175), dec!(155), t0() + Duration::minutes(1)),
            None,
        )
        .unwrap();

    let late = detector
        .observe(
            moneyline("g1", "book_b", dec!(-180), dec!(160), t0() + Duration::minutes(10)),
            None,
        )
        .unwrap();
    assert_eq!(late.movement().unwrap().impact_class, ImpactClass::None);
}

#[test]
fn test_move_against_public_is_sharp() {
    let detector = detector();
    let splits = BettingSplits {
        tickets: BTreeMap::from([(Side::Home, dec!(25)), (Side::Away, dec!(75))]),
        money: None,
    };
    detector
        .observe(moneyline("g1", "dk", dec!(-150), dec!(130), t0()), Some(&splits))
        .unwrap();

    let toward_home = detector
        .observe(
            moneyline("g1", "dk", dec!(-175), dec!(155), t0() + Duration::minutes(1)),
            Some(&splits),
        )
        .unwrap();
    assert_eq!(toward_home.movement().unwrap().impact_class, ImpactClass::Sharp);

    let toward_away = detector
        .observe(
            moneyline("g1", "dk", dec!(-140), dec!(120), t0() + Duration::minutes(2)),
            Some(&splits),
        )
        .unwrap();
    assert_eq!(toward_away.movement().unwrap().impact_class, ImpactClass::Public);
}

#[test]
fn test_total_line_move_uses_line_basis() {
    let detector = detector();
    let total = |line, at| {
        two_sided(
            "g1",
            "dk",
            MarketType::Total,
            [
                (Side::Over, dec!(-110), Some(line)),
                (Side::Under, dec!(-110), Some(line)),
            ],
            at,
        )
    };
    detector.observe(total(dec!(8.5), t0()), None).unwrap();
    let observation = detector
        .observe(total(dec!(9.5), t0() + Duration::minutes(1)), None)
        .unwrap();

    let movement = observation.movement().unwrap();
    assert_eq!(movement.basis, MovementBasis::Line);
    assert_eq!(movement.reference_side, Side::Over);
    assert_eq!(movement.movement_size, dec!(1.0));
    assert_eq!(movement.direction, Direction::Up);
}
