//! In-memory movement history per game
//!
//! Backs steam correlation and sharp scoring. Durable history belongs to the
//! persistence sink; this keeps only the retention window.

use super::types::MarketMovement;
use crate::odds::GameId;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct MovementLog {
    by_game: DashMap<GameId, Vec<Arc<MarketMovement>>>,
}

impl MovementLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and append a movement while holding the game's entry, so that
    /// the builder sees every movement recorded before it
    pub fn record_with(
        &self,
        game_id: &GameId,
        build: impl FnOnce(&[Arc<MarketMovement>]) -> MarketMovement,
    ) -> Arc<MarketMovement> {
        let mut entry = self.by_game.entry(game_id.clone()).or_default();
        let movement = Arc::new(build(entry.as_slice()));
        entry.push(movement.clone());
        movement
    }

    /// Movements for a game observed at or after `since`
    pub fn for_game(&self, game_id: &GameId, since: DateTime<Utc>) -> Vec<Arc<MarketMovement>> {
        self.by_game
            .get(game_id)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|m| m.observed_at() >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop movements older than `retention` before `now`
    pub fn prune(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let cutoff = now - retention;
        let mut removed = 0;
        for mut entry in self.by_game.iter_mut() {
            let before = entry.len();
            entry.retain(|m| m.observed_at() >= cutoff);
            removed += before - entry.len();
        }
        self.by_game.retain(|_, movements| !movements.is_empty());
        removed
    }

    pub fn remove_game(&self, game_id: &GameId) {
        self.by_game.remove(game_id);
    }

    pub fn len(&self) -> usize {
        self.by_game.iter().map(|entry| entry.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
