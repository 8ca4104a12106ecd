//! Fan-out: one timer per (source, game), plus an arbitrage scan per game

use super::pipeline::Pipeline;
use super::providers::GameStatusProvider;
use super::types::{Cadence, GameState, PollReport};
use crate::normalize::Normalizer;
use crate::odds::GameId;
use crate::source::SourceClient;
use crate::telemetry::{self, GaugeMetric};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

struct TrackedGame {
    cancel: Arc<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

/// Shared by every timer task
struct TimerContext {
    pipeline: Arc<Pipeline>,
    status: Arc<dyn GameStatusProvider>,
    cadence: Cadence,
    active_timers: Arc<AtomicUsize>,
}

/// Owns per-source, per-game poll timers
pub struct Scheduler {
    context: Arc<TimerContext>,
    scan_interval: Duration,
    sources: Vec<(Arc<SourceClient>, Arc<dyn Normalizer>)>,
    games: Arc<DashMap<GameId, TrackedGame>>,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<Pipeline>,
        status: Arc<dyn GameStatusProvider>,
        cadence: Cadence,
        scan_interval: Duration,
    ) -> Self {
        Self {
            context: Arc::new(TimerContext {
                pipeline,
                status,
                cadence,
                active_timers: Arc::new(AtomicUsize::new(0)),
            }),
            scan_interval,
            sources: Vec::new(),
            games: Arc::new(DashMap::new()),
        }
    }

    /// Register a source. Applies to games tracked afterwards.
    pub fn add_source(&mut self, client: Arc<SourceClient>, normalizer: Arc<dyn Normalizer>) {
        self.sources.push((client, normalizer));
    }

    pub fn sources(&self) -> impl Iterator<Item = &Arc<SourceClient>> {
        self.sources.iter().map(|(client, _)| client)
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.context.pipeline
    }

    /// Start polling a game on every source. Returns false if it is already
    /// tracked. Once every timer has stopped on its own the game is dropped
    /// and may be tracked again.
    pub fn track_game(&self, game_id: GameId) -> bool {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let cancel = Arc::new(cancel_tx);
        match self.games.entry(game_id.clone()) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(slot) => {
                slot.insert(TrackedGame {
                    cancel: cancel.clone(),
                    tasks: Vec::new(),
                });
            }
        }
        telemetry::set_gauge(GaugeMetric::TrackedGames, self.games.len() as f64);

        let remaining = Arc::new(AtomicUsize::new(self.sources.len()));
        let mut tasks = Vec::with_capacity(self.sources.len() + 1);

        for (client, normalizer) in &self.sources {
            let timer = SourceTimer {
                context: self.context.clone(),
                client: client.clone(),
                normalizer: normalizer.clone(),
                game_id: game_id.clone(),
                cancel: cancel_rx.clone(),
            };
            let cancel = cancel.clone();
            let remaining = remaining.clone();
            let games = self.games.clone();
            let pipeline = self.context.pipeline.clone();
            let game_id = game_id.clone();
            tasks.push(tokio::spawn(async move {
                timer.run().await;
                // Last timer out stops the arbitrage scan and retires the game
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    cancel.send_replace(true);
                    retire_game(&games, &pipeline, &game_id, &cancel);
                }
            }));
        }

        tasks.push(tokio::spawn(run_scan(
            self.context.pipeline.clone(),
            game_id.clone(),
            self.scan_interval,
            cancel_rx,
        )));

        tracing::info!(game_id = %game_id, sources = self.sources.len(), "Tracking game");
        // Already retired if every timer finished before we got here
        if let Some(mut tracked) = self.games.get_mut(&game_id) {
            if Arc::ptr_eq(&tracked.cancel, &cancel) {
                tracked.tasks = tasks;
            }
        }
        true
    }

    /// Stop all timers for a game and drop its state. In-flight fetches
    /// finish and their results are discarded.
    pub async fn cancel_game(&self, game_id: &GameId) -> bool {
        let Some((_, tracked)) = self.games.remove(game_id) else {
            return false;
        };
        telemetry::set_gauge(GaugeMetric::TrackedGames, self.games.len() as f64);

        tracked.cancel.send_replace(true);
        for result in join_all(tracked.tasks).await {
            if let Err(e) = result {
                tracing::error!(game_id = %game_id, error = %e, "Timer task failed");
            }
        }
        self.context.pipeline.forget_game(game_id);
        tracing::info!(game_id = %game_id, "Stopped tracking game");
        true
    }

    pub fn tracked_games(&self) -> Vec<GameId> {
        self.games.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Running (source, game) timers
    pub fn active_timers(&self) -> usize {
        self.context.active_timers.load(Ordering::Acquire)
    }

    /// Cancel every game and wait for the timers to stop
    pub async fn shutdown(&self) {
        let games = self.tracked_games();
        join_all(games.iter().map(|game_id| self.cancel_game(game_id))).await;
        tracing::info!(games = games.len(), "Scheduler stopped");
    }
}

/// Drop a game whose timers all stopped by themselves. A no-op when
/// `cancel_game` got there first or the id was tracked again since.
fn retire_game(
    games: &DashMap<GameId, TrackedGame>,
    pipeline: &Pipeline,
    game_id: &GameId,
    cancel: &Arc<watch::Sender<bool>>,
) {
    let retired = games
        .remove_if(game_id, |_, tracked| Arc::ptr_eq(&tracked.cancel, cancel))
        .is_some();
    if retired {
        telemetry::set_gauge(GaugeMetric::TrackedGames, games.len() as f64);
        pipeline.forget_game(game_id);
        tracing::info!(game_id = %game_id, "All timers stopped, game no longer tracked");
    }
}

struct SourceTimer {
    context: Arc<TimerContext>,
    client: Arc<SourceClient>,
    normalizer: Arc<dyn Normalizer>,
    game_id: GameId,
    cancel: watch::Receiver<bool>,
}

impl SourceTimer {
    fn spawn_poll(&self, polls: &mut JoinSet<PollReport>) {
        let pipeline = self.context.pipeline.clone();
        let client = self.client.clone();
        let normalizer = self.normalizer.clone();
        let game_id = self.game_id.clone();
        let cancel = self.cancel.clone();
        polls.spawn(async move {
            pipeline
                .poll(&client, normalizer.as_ref(), &game_id, &cancel)
                .await
        });
    }

    async fn current_state(&self, last: GameState) -> GameState {
        match self.context.status.game_state(&self.game_id).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(game_id = %self.game_id, error = %e, "Game status unavailable, keeping last state");
                last
            }
        }
    }

    fn log_report(&self, report: &PollReport) {
        // The client already logs failures at the right level
        if let Some(e) = &report.error {
            tracing::debug!(
                source = %report.source,
                game_id = %report.game_id,
                error = %e,
                "Poll did not complete"
            );
        }
    }

    /// Ticks do not wait for the previous poll; the client skips a tick whose
    /// predecessor is still in flight.
    async fn run(mut self) {
        let active = self.context.active_timers.fetch_add(1, Ordering::AcqRel) + 1;
        telemetry::set_gauge(GaugeMetric::ActiveTimers, active as f64);
        tracing::info!(source = %self.client.name(), game_id = %self.game_id, "Timer started");

        let mut polls: JoinSet<PollReport> = JoinSet::new();
        let mut state = GameState::default();
        let mut next_tick = Instant::now();
        let mut reason = "cancelled";

        loop {
            if *self.cancel.borrow() {
                break;
            }

            tokio::select! {
                changed = self.cancel.changed() => {
                    if changed.is_err() || *self.cancel.borrow() {
                        break;
                    }
                }

                Some(joined) = polls.join_next(), if !polls.is_empty() => {
                    match joined {
                        Ok(report) => {
                            self.log_report(&report);
                            if report.closed {
                                reason = "market closed";
                                break;
                            }
                        }
                        Err(e) => tracing::error!(game_id = %self.game_id, error = %e, "Poll task failed"),
                    }
                }

                _ = tokio::time::sleep_until(next_tick) => {
                    state = self.current_state(state).await;
                    if state == GameState::Postgame {
                        // Final poll, then stop once the source has answered
                        let report = self
                            .context
                            .pipeline
                            .poll(&self.client, self.normalizer.as_ref(), &self.game_id, &self.cancel)
                            .await;
                        self.log_report(&report);
                        if report.completed() {
                            reason = "postgame poll complete";
                            break;
                        }
                    } else {
                        self.spawn_poll(&mut polls);
                    }
                    next_tick = Instant::now() + self.context.cadence.interval(state);
                    tracing::debug!(
                        source = %self.client.name(),
                        game_id = %self.game_id,
                        state = %state,
                        next_in_secs = self.context.cadence.interval(state).as_secs(),
                        "Tick dispatched"
                    );
                }
            }
        }

        // Let in-flight polls finish; a cancelled game discards their results
        while let Some(joined) = polls.join_next().await {
            if let Ok(report) = joined {
                self.log_report(&report);
            }
        }

        let active = self.context.active_timers.fetch_sub(1, Ordering::AcqRel) - 1;
        telemetry::set_gauge(GaugeMetric::ActiveTimers, active as f64);
        tracing::info!(source = %self.client.name(), game_id = %self.game_id, reason, "Timer stopped");
    }
}

/// Periodic arbitrage scan, independent of fetch cadence
async fn run_scan(
    pipeline: Arc<Pipeline>,
    game_id: GameId,
    period: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *cancel.borrow() {
            break;
        }

        tokio::select! {
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }

            _ = interval.tick() => {
                pipeline.arbitrage(&game_id, Utc::now());
            }
        }
    }

    tracing::debug!(game_id = %game_id, "Arbitrage scan stopped");
}
