//! Benchmarks for odds math and the arbitrage scan

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use odds_pipeline::arbitrage::{scan_quotes, ArbitrageScannerConfig};
use odds_pipeline::movement::Snapshot;
use odds_pipeline::odds::{
    implied_probability, GameId, ImpliedMetrics, MarketStatus, MarketType, OddsQuote, Side,
    SidePrice, Sportsbook,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;

fn quote(book: usize, market_type: MarketType, a: Decimal, b: Decimal) -> OddsQuote {
    let (first, second, line) = match market_type {
        MarketType::Total => (Side::Over, Side::Under, Some(dec!(8.5))),
        _ => (Side::Home, Side::Away, None),
    };
    let mut side_values = BTreeMap::new();
    side_values.insert(first, SidePrice { odds: a, line });
    side_values.insert(second, SidePrice { odds: b, line });
    OddsQuote {
        game_id: GameId::new("bench"),
        sportsbook: Sportsbook::new(format!("book{}", book)),
        market_type,
        side_values,
        limit_amount: None,
        market_status: MarketStatus::Open,
        observed_at: Utc::now(),
    }
}

fn benchmark_implied_probability(c: &mut Criterion) {
    c.bench_function("implied_probability_favorite", |b| {
        b.iter(|| implied_probability(black_box(dec!(-150))))
    });
    c.bench_function("implied_probability_underdog", |b| {
        b.iter(|| implied_probability(black_box(dec!(130))))
    });
}

fn benchmark_implied_metrics(c: &mut Criterion) {
    let quote = quote(0, MarketType::Moneyline, dec!(-150), dec!(130));
    c.bench_function("implied_metrics_two_sided", |b| {
        b.iter(|| ImpliedMetrics::from_quote(black_box(&quote)))
    });
}

fn benchmark_arbitrage_scan(c: &mut Criterion) {
    let config = ArbitrageScannerConfig::default();
    let game_id = GameId::new("bench");
    let snapshots: Vec<Snapshot> = (0..12)
        .flat_map(|book| {
            let shade = Decimal::from(book as i64 * 3);
            [
                quote(book, MarketType::Moneyline, dec!(-150) - shade, dec!(130) + shade),
                quote(book, MarketType::Total, dec!(-105) - shade, dec!(-115) - shade),
            ]
        })
        .map(|q| Snapshot::new(Arc::new(q)))
        .collect();

    c.bench_function("arbitrage_scan_12_books", |b| {
        b.iter(|| scan_quotes(black_box(&game_id), black_box(&snapshots), &config, Utc::now()))
    });
}

criterion_group!(
    benches,
    benchmark_implied_probability,
    benchmark_implied_metrics,
    benchmark_arbitrage_scan
);
criterion_main!(benches);
