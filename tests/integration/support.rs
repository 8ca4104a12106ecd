//! Shared builders

use chrono::{DateTime, Utc};
use odds_pipeline::config::{Config, SourceConfig};
use odds_pipeline::data::MemorySink;
use odds_pipeline::normalize::SourceKind;
use odds_pipeline::odds::{
    GameId, MarketStatus, MarketType, OddsQuote, Side, SidePrice, Sportsbook,
};
use odds_pipeline::scheduler::{NoSplits, Pipeline};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

pub fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-07-26T18:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn two_sided(
    game: &str,
    book: &str,
    market_type: MarketType,
    sides: [(Side, Decimal, Option<Decimal>); 2],
    at: DateTime<Utc>,
) -> OddsQuote {
    let mut side_values = BTreeMap::new();
    for (side, odds, line) in sides {
        side_values.insert(side, SidePrice { odds, line });
    }
    OddsQuote {
        game_id: GameId::new(game),
        sportsbook: Sportsbook::new(book),
        market_type,
        side_values,
        limit_amount: None,
        market_status: MarketStatus::Open,
        observed_at: at,
    }
}

pub fn moneyline(game: &str, book: &str, home: Decimal, away: Decimal, at: DateTime<Utc>) -> OddsQuote {
    two_sided(
        game,
        book,
        MarketType::Moneyline,
        [(Side::Home, home, None), (Side::Away, away, None)],
        at,
    )
}

pub fn pipeline() -> (Pipeline, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let pipeline = Pipeline::from_config(&Config::default(), Arc::new(NoSplits), sink.clone());
    (pipeline, sink)
}

pub fn source_config(kind: SourceKind, base_url: &str) -> SourceConfig {
    let mut config = SourceConfig::new(kind.to_string(), kind, base_url);
    config.api_key = Some("test-key".to_string());
    config
}
