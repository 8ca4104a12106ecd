//! Fan-in: normalized quotes through the movement detector to the sink and
//! subscribers

use super::providers::BettingSplitsProvider;
use super::types::{PipelineEvent, PollReport};
use crate::arbitrage::{ArbitrageOpportunity, ArbitrageScanner, ArbitrageScannerConfig};
use crate::config::Config;
use crate::data::OddsSink;
use crate::movement::{MovementDetector, MovementDetectorConfig, Observation, QuoteRejection};
use crate::normalize::{NormalizeOutcome, Normalizer};
use crate::odds::{BettingSplits, GameId, MarketStatus, MarketType};
use crate::sharp::{SharpActionSignal, SharpScorer, SharpScorerConfig};
use crate::source::SourceClient;
use crate::telemetry::{self, CounterMetric};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

const EVENT_CAPACITY: usize = 1024;

/// Shared processing stages for every source and game
pub struct Pipeline {
    detector: MovementDetector,
    scanner: ArbitrageScanner,
    scorer: SharpScorer,
    splits: Arc<dyn BettingSplitsProvider>,
    sink: Arc<dyn OddsSink>,
    events: broadcast::Sender<PipelineEvent>,
}

impl Pipeline {
    /// Scanner and scorer read the detector's store and log
    pub fn new(
        detector: MovementDetector,
        arbitrage: ArbitrageScannerConfig,
        sharp: SharpScorerConfig,
        splits: Arc<dyn BettingSplitsProvider>,
        sink: Arc<dyn OddsSink>,
    ) -> Self {
        let scanner = ArbitrageScanner::new(arbitrage, detector.store().clone());
        let scorer = SharpScorer::new(sharp, detector.log().clone());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            detector,
            scanner,
            scorer,
            splits,
            sink,
            events,
        }
    }

    pub fn from_config(
        config: &Config,
        splits: Arc<dyn BettingSplitsProvider>,
        sink: Arc<dyn OddsSink>,
    ) -> Self {
        Self::new(
            MovementDetector::new(MovementDetectorConfig::from(&config.movement)),
            ArbitrageScannerConfig::from(&config.arbitrage),
            SharpScorerConfig::from(&config.sharp),
            splits,
            sink,
        )
    }

    pub fn detector(&self) -> &MovementDetector {
        &self.detector
    }

    /// Receive quotes, movements and arbitrage as they happen. A receiver
    /// that falls behind loses the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: PipelineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Fetch, normalize and ingest one game from one source. Results are
    /// discarded when `cancel` is set by the time the fetch returns.
    pub async fn poll(
        &self,
        client: &SourceClient,
        normalizer: &dyn Normalizer,
        game_id: &GameId,
        cancel: &watch::Receiver<bool>,
    ) -> PollReport {
        let payload = match client.fetch(game_id).await {
            Ok(payload) => payload,
            Err(e) => {
                let mut report = PollReport::new(client.name(), game_id.clone());
                report.error = Some(e);
                return report;
            }
        };

        if *cancel.borrow() {
            tracing::debug!(source = %client.name(), game_id = %game_id, "Game cancelled during fetch, discarding payload");
            let mut report = PollReport::new(client.name(), game_id.clone());
            report.cancelled = true;
            return report;
        }

        let outcome = normalizer.normalize(&payload);
        self.ingest(client.name(), game_id, outcome).await
    }

    /// Run normalized quotes through the detector, then the sink and
    /// subscribers
    pub async fn ingest(
        &self,
        source: &str,
        game_id: &GameId,
        outcome: NormalizeOutcome,
    ) -> PollReport {
        let mut report = PollReport::new(source, game_id.clone());

        for error in &outcome.rejected {
            tracing::warn!(source = %source, game_id = %game_id, error = %error, "Dropped invalid record");
        }
        report.validation_dropped = outcome.rejected.len();
        if report.validation_dropped > 0 {
            telemetry::increment(
                CounterMetric::ValidationDropped,
                &[("source", source)],
                report.validation_dropped as u64,
            );
        }

        report.closed = !outcome.quotes.is_empty()
            && outcome
                .quotes
                .iter()
                .all(|q| q.market_status == MarketStatus::Closed);

        let mut splits_cache: BTreeMap<MarketType, Option<BettingSplits>> = BTreeMap::new();
        for quote in outcome.quotes {
            if !splits_cache.contains_key(&quote.market_type) {
                let splits = self.fetch_splits(&quote.game_id, quote.market_type).await;
                splits_cache.insert(quote.market_type, splits);
            }
            let splits = splits_cache.get(&quote.market_type).and_then(Option::as_ref);

            match self.detector.observe(quote, splits) {
                Ok(Observation::Refreshed) => report.refreshed += 1,
                Ok(observation) => {
                    if let Some(quote) = observation.accepted_quote() {
                        report.accepted += 1;
                        self.sink.append_quote(quote.clone());
                        self.publish(PipelineEvent::QuoteAccepted(quote.clone()));
                    }
                    if let Some(movement) = observation.movement() {
                        report.movements += 1;
                        self.sink.append_movement(movement.clone());
                        self.publish(PipelineEvent::MovementDetected(movement.clone()));
                    }
                }
                Err(rejection) => {
                    report.rejected += 1;
                    match rejection {
                        QuoteRejection::Duplicate => {
                            tracing::debug!(source = %source, game_id = %game_id, "Duplicate quote dropped")
                        }
                        _ => tracing::warn!(
                            source = %source,
                            game_id = %game_id,
                            reason = rejection.label(),
                            error = %rejection,
                            "Quote rejected"
                        ),
                    }
                }
            }
        }

        if report.accepted > 0 {
            telemetry::increment(
                CounterMetric::QuotesAccepted,
                &[("source", source)],
                report.accepted as u64,
            );
        }

        tracing::debug!(
            source = %source,
            game_id = %game_id,
            accepted = report.accepted,
            refreshed = report.refreshed,
            movements = report.movements,
            rejected = report.rejected,
            dropped = report.validation_dropped,
            "Ingested payload"
        );

        report
    }

    async fn fetch_splits(&self, game_id: &GameId, market_type: MarketType) -> Option<BettingSplits> {
        match self.splits.splits(game_id, market_type).await {
            Ok(splits) => splits,
            Err(e) => {
                tracing::warn!(game_id = %game_id, market = %market_type, error = %e, "Betting splits unavailable");
                None
            }
        }
    }

    /// Scan a game for arbitrage and publish what is found
    pub fn arbitrage(&self, game_id: &GameId, now: DateTime<Utc>) -> Vec<ArbitrageOpportunity> {
        let found = self.scanner.scan(game_id, now);
        for opportunity in &found {
            self.publish(PipelineEvent::ArbitrageFound(opportunity.clone()));
        }
        found
    }

    /// Sharp-action signal computed from the movement log and current splits
    pub async fn sharp_signal(&self, game_id: &GameId, now: DateTime<Utc>) -> SharpActionSignal {
        let mut splits = BTreeMap::new();
        for market_type in MarketType::ALL {
            if let Some(s) = self.fetch_splits(game_id, market_type).await {
                splits.insert(market_type, s);
            }
        }
        self.scorer.signal(game_id, &splits, now)
    }

    /// Drop snapshots and movement history for a game
    pub fn forget_game(&self, game_id: &GameId) {
        let removed = self.detector.store().remove_game(game_id);
        self.detector.log().remove_game(game_id);
        tracing::debug!(game_id = %game_id, snapshots = removed, "Forgot game");
    }

    /// Drop movements past retention
    pub fn prune(&self) -> usize {
        self.detector.prune()
    }
}
