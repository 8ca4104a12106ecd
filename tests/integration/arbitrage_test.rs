//! Integration tests for cross-book arbitrage over the snapshot store

use crate::support::{moneyline, t0, two_sided};
use chrono::Duration;
use odds_pipeline::arbitrage::{ArbitrageScanner, ArbitrageScannerConfig};
use odds_pipeline::movement::{MovementDetector, MovementDetectorConfig};
use odds_pipeline::odds::{GameId, MarketStatus, MarketType, OddsQuote, Side, Sportsbook};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

struct Fixture {
    detector: MovementDetector,
    scanner: ArbitrageScanner,
}

impl Fixture {
    fn new() -> Self {
        let detector = MovementDetector::new(MovementDetectorConfig::default());
        let scanner =
            ArbitrageScanner::new(ArbitrageScannerConfig::default(), detector.store().clone());
        Self { detector, scanner }
    }

    fn offer(&self, quote: OddsQuote) {
        self.detector.observe(quote, None).unwrap();
    }
}

fn spread(book: &str, home: (Decimal, Decimal), away: (Decimal, Decimal)) -> OddsQuote {
    two_sided(
        "g1",
        book,
        MarketType::Spread,
        [
            (Side::Home, home.1, Some(home.0)),
            (Side::Away, away.1, Some(away.0)),
        ],
        t0(),
    )
}

#[test]
fn test_two_book_arbitrage() {
    let fixture = Fixture::new();
    fixture.offer(moneyline("g1", "book_a", dec!(150), dec!(-200), t0()));
    fixture.offer(moneyline("g1", "book_b", dec!(-200), dec!(120), t0()));

    let found = fixture.scanner.scan(&GameId::new("g1"), t0());
    assert_eq!(found.len(), 1);
    let opp = &found[0];
    assert_eq!(opp.market_type, MarketType::Moneyline);
    assert_eq!(opp.leg_a.sportsbook, Sportsbook::new("book_a"));
    assert_eq!(opp.leg_a.side, Side::Home);
    assert_eq!(opp.leg_a.implied_probability, dec!(0.4));
    assert_eq!(opp.leg_b.sportsbook, Sportsbook::new("book_b"));
    assert_eq!(opp.leg_b.side, Side::Away);
    assert!((opp.implied_sum - dec!(0.8545)).abs() < dec!(0.0001));
    assert!((opp.profit_margin - dec!(0.1703)).abs() < dec!(0.0005));
}

#[test]
fn test_no_arbitrage_on_efficient_market() {
    let fixture = Fixture::new();
    fixture.offer(moneyline("g1", "book_a", dec!(-150), dec!(130), t0()));
    fixture.offer(moneyline("g1", "book_b", dec!(-145), dec!(125), t0()));

    assert!(fixture.scanner.scan(&GameId::new("g1"), t0()).is_empty());
}

#[test]
fn test_margin_must_exceed_minimum() {
    // +103 both ways: margin 1.5%
    let fixture = Fixture::new();
    fixture.offer(moneyline("g1", "book_a", dec!(103), dec!(-130), t0()));
    fixture.offer(moneyline("g1", "book_b", dec!(-130), dec!(103), t0()));
    assert!(fixture.scanner.scan(&GameId::new("g1"), t0()).is_empty());

    // +110 both ways clears the minimum
    let fixture = Fixture::new();
    fixture.offer(moneyline("g1", "book_a", dec!(110), dec!(-130), t0()));
    fixture.offer(moneyline("g1", "book_b", dec!(-130), dec!(110), t0()));
    let found = fixture.scanner.scan(&GameId::new("g1"), t0());
    assert_eq!(found.len(), 1);
    assert!(found[0].profit_margin > dec!(0.02));
}

#[test]
fn test_stale_and_closed_quotes_ignored() {
    let fixture = Fixture::new();
    fixture.offer(moneyline("g1", "book_a", dec!(150), dec!(-200), t0()));
    fixture.offer(moneyline("g1", "book_b", dec!(-200), dec!(120), t0()));

    let later = t0() + Duration::minutes(10);
    assert!(fixture.scanner.scan(&GameId::new("g1"), later).is_empty());

    let fixture = Fixture::new();
    fixture.offer(moneyline("g1", "book_a", dec!(150), dec!(-200), t0()));
    let mut closed = moneyline("g1", "book_b", dec!(-200), dec!(120), t0());
    closed.market_status = MarketStatus::Closed;
    fixture.offer(closed);
    assert!(fixture.scanner.scan(&GameId::new("g1"), t0()).is_empty());
}

#[test]
fn test_refresh_keeps_quote_fresh() {
    let fixture = Fixture::new();
    let a = moneyline("g1", "book_a", dec!(150), dec!(-200), t0());
    let b = moneyline("g1", "book_b", dec!(-200), dec!(120), t0());
    fixture.offer(a.clone());
    fixture.offer(b.clone());

    let seen_again = t0() + Duration::minutes(8);
    for mut quote in [a, b] {
        quote.observed_at = seen_again;
        fixture.offer(quote);
    }

    let found = fixture
        .scanner
        .scan(&GameId::new("g1"), t0() + Duration::minutes(12));
    assert_eq!(found.len(), 1);
}

#[test]
fn test_spread_legs_require_matching_lines() {
    let fixture = Fixture::new();
    fixture.offer(spread("book_a", (dec!(-1.5), dec!(160)), (dec!(1.5), dec!(-190))));
    fixture.offer(spread("book_b", (dec!(-2.5), dec!(-250)), (dec!(2.5), dec!(130))));
    assert!(fixture.scanner.scan(&GameId::new("g1"), t0()).is_empty());

    fixture.offer(spread("book_c", (dec!(-1.5), dec!(-200)), (dec!(1.5), dec!(125))));
    let found = fixture.scanner.scan(&GameId::new("g1"), t0());
    assert_eq!(found.len(), 1);
    let opp = &found[0];
    assert_eq!(opp.market_type, MarketType::Spread);
    assert_eq!(opp.leg_a.line, Some(dec!(-1.5)));
    assert_eq!(opp.leg_b.line, Some(dec!(1.5)));
    assert_eq!(opp.leg_b.sportsbook, Sportsbook::new("book_c"));
}

#[test]
fn test_same_book_pair_is_not_arbitrage() {
    // Negative vig at one book is excluded as a data error
    let fixture = Fixture::new();
    fixture.offer(moneyline("g1", "book_a", dec!(150), dec!(120), t0()));
    assert!(fixture.scanner.scan(&GameId::new("g1"), t0()).is_empty());
}

#[test]
fn test_other_games_do_not_mix() {
    let fixture = Fixture::new();
    fixture.offer(moneyline("g1", "book_a", dec!(150), dec!(-200), t0()));
    fixture.offer(moneyline("g2", "book_b", dec!(-200), dec!(120), t0()));

    assert!(fixture.scanner.scan(&GameId::new("g1"), t0()).is_empty());
    assert!(fixture.scanner.scan(&GameId::new("g2"), t0()).is_empty());
}
