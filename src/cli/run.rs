//! Run command implementation

use crate::config::Config;
use crate::data::{DataRecorder, NullSink, OddsSink, RecorderConfig};
use crate::odds::GameId;
use crate::scheduler::{Cadence, NoSplits, Pipeline, Scheduler, StaticGameStatus};
use crate::source::{HttpSource, SourceClient, SourceClientConfig};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Track these game IDs instead of the configured games
    #[arg(short, long)]
    pub game: Vec<String>,

    /// Seconds between source health reports
    #[arg(long, default_value = "60")]
    pub status_interval: u64,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        if config.sources.is_empty() {
            anyhow::bail!("No sources configured");
        }

        let recorder = if config.data.capture_enabled {
            tracing::info!(output_dir = %config.data.output_dir.display(), "Capturing quotes and movements");
            Some(Arc::new(DataRecorder::new(RecorderConfig::from(&config.data))))
        } else {
            None
        };
        let sink: Arc<dyn OddsSink> = match &recorder {
            Some(recorder) => recorder.clone(),
            None => Arc::new(NullSink),
        };

        let status = Arc::new(StaticGameStatus::new());
        let games: Vec<GameId> = if self.game.is_empty() {
            config
                .games
                .iter()
                .map(|g| {
                    let id = GameId::new(g.id.as_str());
                    status.set(id.clone(), g.state);
                    id
                })
                .collect()
        } else {
            self.game.iter().map(|g| GameId::new(g.as_str())).collect()
        };
        if games.is_empty() {
            anyhow::bail!("No games to track");
        }

        let pipeline = Arc::new(Pipeline::from_config(config, Arc::new(NoSplits), sink));
        let mut scheduler = Scheduler::new(
            pipeline.clone(),
            status,
            Cadence::from(&config.schedule),
            Duration::from_secs(config.arbitrage.scan_interval_secs.max(1)),
        );

        for source in &config.sources {
            let client_config = SourceClientConfig::from_config(source, &config.breaker);
            let http = HttpSource::new(source.clone())?;
            let client = Arc::new(SourceClient::new(Arc::new(http), client_config));
            scheduler.add_source(client, Arc::new(source.kind));
            tracing::info!(source = %source.name, kind = %source.kind, "Source registered");
        }

        for game in games {
            scheduler.track_game(game);
        }

        let mut status_interval =
            tokio::time::interval(Duration::from_secs(self.status_interval.max(1)));
        status_interval.tick().await;

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Failed to listen for shutdown signal");
                    }
                    tracing::info!("Shutting down");
                    break;
                }

                _ = status_interval.tick() => {
                    for client in scheduler.sources() {
                        let stats = client.stats();
                        tracing::info!(
                            source = %stats.source,
                            attempts = stats.attempts,
                            successes = stats.successes,
                            rate_limited = stats.rate_limited,
                            auth_failures = stats.auth_failures,
                            transient = stats.transient_failures,
                            malformed = stats.malformed,
                            circuit_rejections = stats.circuit_rejections,
                            breaker = ?stats.breaker,
                            degraded_games = stats.degraded_games,
                            "Source health"
                        );
                    }
                    let pruned = pipeline.prune();
                    tracing::info!(
                        games = scheduler.tracked_games().len(),
                        timers = scheduler.active_timers(),
                        snapshots = pipeline.detector().store().len(),
                        pruned,
                        "Pipeline status"
                    );
                }
            }
        }

        scheduler.shutdown().await;
        drop(scheduler);
        drop(pipeline);

        if let Some(recorder) = recorder {
            match Arc::try_unwrap(recorder) {
                Ok(recorder) => {
                    let stats = recorder.shutdown().await;
                    tracing::info!(
                        quotes = stats.quotes_written,
                        movements = stats.movements_written,
                        files = stats.files_written,
                        dropped = stats.dropped,
                        "Capture flushed"
                    );
                }
                Err(_) => tracing::warn!("Recorder still in use, capture buffers not flushed"),
            }
        }

        Ok(())
    }
}
