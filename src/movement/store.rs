//! Last-known quote per (game, book, market)
//!
//! Each key has its own mutex so read-compare-write for one key is atomic
//! while unrelated keys proceed in parallel. There is no store-wide lock.

use crate::odds::{GameId, OddsQuote, QuoteKey};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Current state of one key
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Last accepted quote
    pub quote: Arc<OddsQuote>,
    /// Newest observation time at which these values were confirmed
    pub last_seen: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(quote: Arc<OddsQuote>) -> Self {
        let last_seen = quote.observed_at;
        Self { quote, last_seen }
    }
}

type Slot = Arc<Mutex<Option<Snapshot>>>;

/// Keyed snapshot store with per-key atomic update
#[derive(Default)]
pub struct SnapshotStore {
    slots: DashMap<QuoteKey, Slot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &QuoteKey) -> Slot {
        if let Some(slot) = self.slots.get(key) {
            return slot.clone();
        }
        self.slots.entry(key.clone()).or_default().clone()
    }

    /// Run `f` with exclusive access to one key's snapshot
    ///
    /// The map shard is released before the key mutex is taken, so a slow
    /// update never blocks other keys.
    pub fn with_key<R>(&self, key: &QuoteKey, f: impl FnOnce(&mut Option<Snapshot>) -> R) -> R {
        let slot = self.slot(key);
        let mut guard = slot.lock();
        f(&mut guard)
    }

    pub fn latest(&self, key: &QuoteKey) -> Option<Snapshot> {
        let slot = self.slots.get(key)?.clone();
        let guard = slot.lock();
        guard.clone()
    }

    /// Current snapshots for every book and market of a game
    pub fn snapshots_for_game(&self, game_id: &GameId) -> Vec<Snapshot> {
        let slots: Vec<Slot> = self
            .slots
            .iter()
            .filter(|entry| &entry.key().game_id == game_id)
            .map(|entry| entry.value().clone())
            .collect();
        slots.iter().filter_map(|slot| slot.lock().clone()).collect()
    }

    /// Drop every key belonging to a game
    pub fn remove_game(&self, game_id: &GameId) -> usize {
        let before = self.slots.len();
        self.slots.retain(|key, _| &key.game_id != game_id);
        before - self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
