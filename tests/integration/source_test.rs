//! Integration tests for HTTP sources and client protection

use crate::support::source_config;
use odds_pipeline::normalize::SourceKind;
use odds_pipeline::odds::GameId;
use odds_pipeline::source::{
    BreakerStatus, CircuitBreakerConfig, HttpSource, OddsSource, SourceClient, SourceClientConfig,
    SourceError,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn respond(server: &MockServer, game: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/getMLBBettingOdds"))
        .and(query_param("gameID", game))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_http_status_mapping() {
    let server = MockServer::start().await;
    respond(&server, "auth", ResponseTemplate::new(401)).await;
    respond(&server, "forbidden", ResponseTemplate::new(403)).await;
    respond(&server, "limited", ResponseTemplate::new(429)).await;
    respond(&server, "down", ResponseTemplate::new(503)).await;
    respond(
        &server,
        "garbage",
        ResponseTemplate::new(200).set_body_string("<html>not json</html>"),
    )
    .await;
    respond(
        &server,
        "envelope",
        ResponseTemplate::new(200).set_body_json(json!({"statusCode": 403, "body": "denied"})),
    )
    .await;

    let source = HttpSource::new(source_config(SourceKind::Tank01, &server.uri())).unwrap();

    assert!(matches!(
        source.fetch(&GameId::new("auth")).await,
        Err(SourceError::AuthFailure(_))
    ));
    assert!(matches!(
        source.fetch(&GameId::new("forbidden")).await,
        Err(SourceError::AuthFailure(_))
    ));
    assert_eq!(
        source.fetch(&GameId::new("limited")).await.unwrap_err(),
        SourceError::RateLimited
    );
    assert!(matches!(
        source.fetch(&GameId::new("down")).await,
        Err(SourceError::TransientNetwork(_))
    ));
    assert!(matches!(
        source.fetch(&GameId::new("garbage")).await,
        Err(SourceError::MalformedResponse(_))
    ));
    assert!(matches!(
        source.fetch(&GameId::new("envelope")).await,
        Err(SourceError::AuthFailure(_))
    ));
}

#[tokio::test]
async fn test_unreachable_source_is_transient() {
    // Nothing listens on this port once the server is dropped
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };
    let source = HttpSource::new(source_config(SourceKind::Tank01, &uri)).unwrap();
    assert!(matches!(
        source.fetch(&GameId::new("g1")).await,
        Err(SourceError::TransientNetwork(_))
    ));
}

#[tokio::test]
async fn test_missing_key_fails_without_request() {
    let server = MockServer::start().await;
    respond(&server, "g1", ResponseTemplate::new(200).set_body_json(json!([]))).await;

    let mut config = source_config(SourceKind::Tank01, &server.uri());
    config.api_key = None;
    let source = HttpSource::new(config).unwrap();

    assert!(matches!(
        source.fetch(&GameId::new("g1")).await,
        Err(SourceError::AuthFailure(_))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_breaker_stops_network_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getMLBBettingOdds"))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&server)
        .await;

    let source = HttpSource::new(source_config(SourceKind::Tank01, &server.uri())).unwrap();
    let client = SourceClient::new(
        Arc::new(source),
        SourceClientConfig {
            requests_per_minute: 600,
            burst: 100,
            breaker: CircuitBreakerConfig::default().with_cooldown(Duration::from_secs(60)),
            ..Default::default()
        },
    );
    let game = GameId::new("g1");

    for _ in 0..5 {
        assert!(matches!(
            client.fetch(&game).await,
            Err(SourceError::TransientNetwork(_))
        ));
    }
    for _ in 0..10 {
        assert_eq!(client.fetch(&game).await.unwrap_err(), SourceError::CircuitOpen);
    }

    let stats = client.stats();
    assert_eq!(stats.attempts, 5);
    assert_eq!(stats.circuit_rejections, 10);
    assert_eq!(stats.breaker, BreakerStatus::Open);
    // Mock expectation of exactly 5 requests is verified on drop
}

#[tokio::test]
async fn test_credential_refresh_restores_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/getMLBBettingOdds"))
        .and(header("X-RapidAPI-Key", "fresh-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"statusCode": 200, "body": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/getMLBBettingOdds"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let source = HttpSource::new(source_config(SourceKind::Tank01, &server.uri())).unwrap();
    let client = SourceClient::new(Arc::new(source), SourceClientConfig::default());
    let game = GameId::new("g1");

    assert!(matches!(
        client.fetch(&game).await,
        Err(SourceError::AuthFailure(_))
    ));
    assert!(client.is_degraded(&game));
    assert_eq!(client.fetch(&game).await.unwrap_err(), SourceError::Degraded);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    client.refresh_credentials("fresh-key".to_string());
    let payload = client.fetch(&game).await.unwrap();
    assert_eq!(payload.body, json!([]));
    assert!(!client.is_degraded(&game));
    assert_eq!(client.stats().degraded_games, 0);
}

#[tokio::test]
async fn test_odds_api_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/sports/baseball_mlb/events/evt1/odds"))
        .and(query_param("apiKey", "test-key"))
        .and(query_param("regions", "us"))
        .and(query_param("oddsFormat", "american"))
        .and(query_param("markets", "h2h,spreads,totals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "evt1"})))
        .expect(1)
        .mount(&server)
        .await;

    let source = HttpSource::new(source_config(SourceKind::OddsApi, &server.uri())).unwrap();
    let payload = source.fetch(&GameId::new("evt1")).await.unwrap();
    assert_eq!(payload.source, "odds_api");
    assert_eq!(payload.body["id"], "evt1");
}
