//! Collaborator interfaces for game status and betting splits

use super::types::GameState;
use crate::odds::{BettingSplits, GameId, MarketType};
use async_trait::async_trait;
use dashmap::DashMap;

/// Game state from the sports-data service
#[async_trait]
pub trait GameStatusProvider: Send + Sync {
    async fn game_state(&self, game_id: &GameId) -> anyhow::Result<GameState>;
}

/// Ticket and money percentages per market. `None` when the collaborator
/// has no data for that market.
#[async_trait]
pub trait BettingSplitsProvider: Send + Sync {
    async fn splits(
        &self,
        game_id: &GameId,
        market_type: MarketType,
    ) -> anyhow::Result<Option<BettingSplits>>;
}

/// Game states set by hand or from configuration. Unknown games are pregame.
#[derive(Debug, Default)]
pub struct StaticGameStatus {
    states: DashMap<GameId, GameState>,
}

impl StaticGameStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, game_id: GameId, state: GameState) {
        self.states.insert(game_id, state);
    }
}

#[async_trait]
impl GameStatusProvider for StaticGameStatus {
    async fn game_state(&self, game_id: &GameId) -> anyhow::Result<GameState> {
        Ok(self
            .states
            .get(game_id)
            .map(|s| *s.value())
            .unwrap_or_default())
    }
}

/// No ticket data at all
#[derive(Debug, Default)]
pub struct NoSplits;

#[async_trait]
impl BettingSplitsProvider for NoSplits {
    async fn splits(
        &self,
        _game_id: &GameId,
        _market_type: MarketType,
    ) -> anyhow::Result<Option<BettingSplits>> {
        Ok(None)
    }
}

/// Fixed splits per (game, market)
#[derive(Debug, Default)]
pub struct StaticSplits {
    splits: DashMap<(GameId, MarketType), BettingSplits>,
}

impl StaticSplits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, game_id: GameId, market_type: MarketType, splits: BettingSplits) {
        self.splits.insert((game_id, market_type), splits);
    }
}

#[async_trait]
impl BettingSplitsProvider for StaticSplits {
    async fn splits(
        &self,
        game_id: &GameId,
        market_type: MarketType,
    ) -> anyhow::Result<Option<BettingSplits>> {
        Ok(self
            .splits
            .get(&(game_id.clone(), market_type))
            .map(|s| s.value().clone()))
    }
}
