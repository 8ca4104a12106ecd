//! End-to-end integration tests

use crate::support::{pipeline, source_config};
use chrono::{Duration as ChronoDuration, Utc};
use odds_pipeline::config::Config;
use odds_pipeline::data::{DataRecorder, OddsSink, ParquetReader, RecorderConfig};
use odds_pipeline::movement::Direction;
use odds_pipeline::normalize::SourceKind;
use odds_pipeline::odds::{GameId, MarketType, Side};
use odds_pipeline::scheduler::PipelineEvent;
use odds_pipeline::source::{HttpSource, SourceClient, SourceClientConfig};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GAME: &str = "20250726_NYY@BOS";

fn tank01_row(home_ml: &str, away_ml: &str, epoch: i64) -> serde_json::Value {
    json!({
        "statusCode": 200,
        "body": [{
            "gameID": GAME,
            "sportsbook": "draftkings",
            "homeML": home_ml,
            "awayML": away_ml,
            "totalOver": "8.5",
            "totalOverOdds": "-110",
            "totalUnder": "8.5",
            "totalUnderOdds": "-110",
            "last_updated_e_time": epoch.to_string()
        }]
    })
}

fn client(kind: SourceKind, server: &MockServer) -> SourceClient {
    let source = HttpSource::new(source_config(kind, &server.uri())).unwrap();
    SourceClient::new(Arc::new(source), SourceClientConfig::default())
}

#[test]
fn test_config_example_loads() {
    let config = Config::example().unwrap();
    assert_eq!(config.sources[0].kind, SourceKind::Tank01);
    assert_eq!(config.sources[1].kind, SourceKind::OddsApi);
    assert_eq!(config.schedule.live_secs, 30);
}

#[tokio::test]
async fn test_tank01_poll_detects_movement() {
    let server = MockServer::start().await;
    let epoch = Utc::now().timestamp();
    Mock::given(method("GET"))
        .and(path("/getMLBBettingOdds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tank01_row("-150", "+130", epoch)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/getMLBBettingOdds"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(tank01_row("-175", "+155", epoch + 60)),
        )
        .mount(&server)
        .await;

    let client = client(SourceKind::Tank01, &server);
    let (pipeline, sink) = pipeline();
    let mut events = pipeline.subscribe();
    let (_cancel_tx, cancel) = watch::channel(false);
    let game = GameId::new(GAME);

    let first = pipeline.poll(&client, &SourceKind::Tank01, &game, &cancel).await;
    assert!(first.completed());
    assert_eq!(first.accepted, 2); // moneyline and total
    assert_eq!(first.movements, 0);

    let second = pipeline.poll(&client, &SourceKind::Tank01, &game, &cancel).await;
    assert_eq!(second.accepted, 1); // total unchanged, only refreshed
    assert_eq!(second.refreshed, 1);
    assert_eq!(second.movements, 1);

    let movements = sink.movements();
    assert_eq!(movements.len(), 1);
    let movement = &movements[0];
    assert_eq!(movement.market_type, MarketType::Moneyline);
    assert_eq!(movement.reference_side, Side::Home);
    assert_eq!(movement.direction, Direction::Up);
    assert_eq!(movement.sportsbook.as_str(), "draftkings");

    let mut movement_events = 0;
    while let Ok(event) = events.try_recv() {
        if let PipelineEvent::MovementDetected(m) = event {
            assert_eq!(m.id, movement.id);
            movement_events += 1;
        }
    }
    assert_eq!(movement_events, 1);
}

#[tokio::test]
async fn test_cancelled_poll_discards_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getMLBBettingOdds"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(tank01_row("-150", "+130", Utc::now().timestamp())),
        )
        .mount(&server)
        .await;

    let client = client(SourceKind::Tank01, &server);
    let (pipeline, sink) = pipeline();
    let (cancel_tx, cancel) = watch::channel(false);
    cancel_tx.send_replace(true);

    let report = pipeline
        .poll(&client, &SourceKind::Tank01, &GameId::new(GAME), &cancel)
        .await;
    assert!(report.cancelled);
    assert!(sink.quotes().is_empty());
    assert!(pipeline.detector().store().is_empty());
}

#[tokio::test]
async fn test_odds_api_cross_book_arbitrage() {
    let server = MockServer::start().await;
    let now = Utc::now();
    let stamp = now.to_rfc3339();
    Mock::given(method("GET"))
        .and(path("/v4/sports/baseball_mlb/events/evt1/odds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "evt1",
            "home_team": "Boston Red Sox",
            "away_team": "New York Yankees",
            "bookmakers": [
                {
                    "key": "book_a",
                    "last_update": stamp,
                    "markets": [{
                        "key": "h2h",
                        "last_update": stamp,
                        "outcomes": [
                            {"name": "Boston Red Sox", "price": 150},
                            {"name": "New York Yankees", "price": -200}
                        ]
                    }]
                },
                {
                    "key": "book_b",
                    "last_update": stamp,
                    "markets": [{
                        "key": "h2h",
                        "last_update": stamp,
                        "outcomes": [
                            {"name": "Boston Red Sox", "price": -200},
                            {"name": "New York Yankees", "price": 120}
                        ]
                    }]
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = client(SourceKind::OddsApi, &server);
    let (pipeline, _sink) = pipeline();
    let (_cancel_tx, cancel) = watch::channel(false);
    let game = GameId::new("evt1");

    let report = pipeline.poll(&client, &SourceKind::OddsApi, &game, &cancel).await;
    assert_eq!(report.accepted, 2);

    let found = pipeline.arbitrage(&game, now + ChronoDuration::seconds(5));
    assert_eq!(found.len(), 1);
    let opportunity = &found[0];
    assert!((opportunity.profit_margin - dec!(0.1703)).abs() < dec!(0.0005));
    assert_ne!(opportunity.leg_a.sportsbook, opportunity.leg_b.sportsbook);

    // Past the max quote age nothing is reported
    assert!(pipeline
        .arbitrage(&game, now + ChronoDuration::minutes(11))
        .is_empty());
}

#[tokio::test]
async fn test_capture_and_read_back() {
    let temp_dir = TempDir::new().unwrap();
    let recorder = DataRecorder::new(RecorderConfig {
        output_dir: temp_dir.path().to_path_buf(),
        buffer_size: 100,
        flush_interval_secs: 60,
        channel_capacity: 100,
    });

    let quote = Arc::new(crate::support::moneyline(
        GAME,
        "draftkings",
        dec!(-150),
        dec!(130),
        crate::support::t0(),
    ));
    recorder.append_quote(quote.clone());
    let stats = recorder.shutdown().await;
    assert_eq!(stats.quotes_written, 1);

    let files = ParquetReader::quote_files(temp_dir.path()).unwrap();
    let read = ParquetReader::new(files[0].clone()).read_quotes().unwrap();
    assert_eq!(read, vec![(*quote).clone()]);
}
