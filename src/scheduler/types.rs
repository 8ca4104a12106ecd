//! Scheduler types

use crate::arbitrage::ArbitrageOpportunity;
use crate::config::ScheduleConfig;
use crate::movement::MarketMovement;
use crate::odds::{GameId, OddsQuote};
use crate::source::SourceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Game state as reported by the sports-data collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    #[default]
    Pregame,
    Live,
    Postgame,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameState::Pregame => write!(f, "pregame"),
            GameState::Live => write!(f, "live"),
            GameState::Postgame => write!(f, "postgame"),
        }
    }
}

impl FromStr for GameState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pregame" | "scheduled" => Ok(GameState::Pregame),
            "live" | "in_progress" => Ok(GameState::Live),
            "postgame" | "final" | "completed" => Ok(GameState::Postgame),
            other => Err(anyhow::anyhow!("Unknown game state: {}", other)),
        }
    }
}

/// Poll interval per game state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub live: Duration,
    pub pregame: Duration,
    pub postgame: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            live: Duration::from_secs(30),
            pregame: Duration::from_secs(300),
            postgame: Duration::from_secs(3600),
        }
    }
}

impl From<&ScheduleConfig> for Cadence {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            live: Duration::from_secs(config.live_secs.max(1)),
            pregame: Duration::from_secs(config.pregame_secs.max(1)),
            postgame: Duration::from_secs(config.postgame_secs.max(1)),
        }
    }
}

impl Cadence {
    pub fn interval(&self, state: GameState) -> Duration {
        match state {
            GameState::Live => self.live,
            GameState::Pregame => self.pregame,
            GameState::Postgame => self.postgame,
        }
    }
}

/// Published to subscribers as the pipeline accepts data
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    QuoteAccepted(Arc<OddsQuote>),
    MovementDetected(Arc<MarketMovement>),
    ArbitrageFound(ArbitrageOpportunity),
}

/// What one poll of one (source, game) produced
#[derive(Debug, Clone)]
pub struct PollReport {
    pub source: String,
    pub game_id: GameId,
    /// Set when the fetch itself failed
    pub error: Option<SourceError>,
    /// Quotes stored as baseline or update
    pub accepted: usize,
    /// Unchanged re-observations that only refreshed freshness
    pub refreshed: usize,
    pub movements: usize,
    pub validation_dropped: usize,
    /// Duplicates, conflicts and stale quotes
    pub rejected: usize,
    /// Every quote in the payload reported a closed market
    pub closed: bool,
    /// Game was cancelled while the fetch was in flight; results discarded
    pub cancelled: bool,
}

impl PollReport {
    pub fn new(source: impl Into<String>, game_id: GameId) -> Self {
        Self {
            source: source.into(),
            game_id,
            error: None,
            accepted: 0,
            refreshed: 0,
            movements: 0,
            validation_dropped: 0,
            rejected: 0,
            closed: false,
            cancelled: false,
        }
    }

    /// The source answered and the payload was processed
    pub fn completed(&self) -> bool {
        self.error.is_none() && !self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence_defaults() {
        let cadence = Cadence::default();
        assert_eq!(cadence.interval(GameState::Live), Duration::from_secs(30));
        assert_eq!(cadence.interval(GameState::Pregame), Duration::from_secs(300));
        assert_eq!(cadence.interval(GameState::Postgame), Duration::from_secs(3600));
    }

    #[test]
    fn test_cadence_from_config_matches_defaults() {
        let cadence = Cadence::from(&ScheduleConfig::default());
        assert_eq!(cadence, Cadence::default());
    }

    #[test]
    fn test_game_state_parse() {
        assert_eq!("LIVE".parse::<GameState>().unwrap(), GameState::Live);
        assert_eq!("final".parse::<GameState>().unwrap(), GameState::Postgame);
        assert_eq!("scheduled".parse::<GameState>().unwrap(), GameState::Pregame);
        assert!("halftime".parse::<GameState>().is_err());
    }

    #[test]
    fn test_poll_report_completed() {
        let mut report = PollReport::new("tank01", GameId::new("g1"));
        assert!(report.completed());
        report.error = Some(SourceError::RateLimited);
        assert!(!report.completed());
    }
}
