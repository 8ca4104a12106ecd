//! Movement types

use crate::odds::{GameId, MarketType, OddsQuote, QuoteRef, Side, Sportsbook};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Movement direction relative to the reference side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Market moved toward the reference side
    Up,
    /// Market moved away from the reference side
    Down,
    /// Change within the noise threshold
    Neutral,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
            Direction::Neutral => f.write_str("neutral"),
        }
    }
}

/// What kind of money likely caused a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactClass {
    /// Moved against the majority of tickets
    Sharp,
    /// Same move at two or more books within the steam window
    Steam,
    /// Moved with the majority of tickets
    Public,
    None,
}

impl fmt::Display for ImpactClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpactClass::Sharp => f.write_str("sharp"),
            ImpactClass::Steam => f.write_str("steam"),
            ImpactClass::Public => f.write_str("public"),
            ImpactClass::None => f.write_str("none"),
        }
    }
}

/// Unit of `movement_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementBasis {
    /// Change in implied probability (0.01 = one point)
    Probability,
    /// Change in spread or total points
    Line,
}

impl fmt::Display for MovementBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementBasis::Probability => f.write_str("probability"),
            MovementBasis::Line => f.write_str("line"),
        }
    }
}

/// One accepted price transition for a (game, book, market) key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMovement {
    pub id: Uuid,
    pub game_id: GameId,
    pub sportsbook: Sportsbook,
    pub market_type: MarketType,
    /// Side the movement is measured on
    pub reference_side: Side,
    pub basis: MovementBasis,
    pub previous_quote: QuoteRef,
    pub current_quote: QuoteRef,
    /// Signed change; positive favours the reference side
    pub movement_size: Decimal,
    pub direction: Direction,
    pub impact_class: ImpactClass,
    pub detected_at: DateTime<Utc>,
}

impl MarketMovement {
    /// Side the market moved toward, if any
    pub fn favored_side(&self) -> Option<Side> {
        match self.direction {
            Direction::Up => Some(self.reference_side),
            Direction::Down => self.reference_side.opposite(),
            Direction::Neutral => None,
        }
    }

    /// Observation time of the quote that produced this movement
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.current_quote.observed_at
    }
}

/// Result of offering a quote to the detector
#[derive(Debug, Clone)]
pub enum Observation {
    /// First quote for the key; stored as baseline
    Baseline(Arc<OddsQuote>),
    /// Same values seen at a later time; freshness updated, nothing stored
    Refreshed,
    /// New values accepted. `movement` is absent when no priced side changed.
    Updated {
        quote: Arc<OddsQuote>,
        movement: Option<Arc<MarketMovement>>,
    },
}

impl Observation {
    /// Quote to append to persistent storage, if any
    pub fn accepted_quote(&self) -> Option<&Arc<OddsQuote>> {
        match self {
            Observation::Baseline(quote) | Observation::Updated { quote, .. } => Some(quote),
            Observation::Refreshed => None,
        }
    }

    pub fn movement(&self) -> Option<&Arc<MarketMovement>> {
        match self {
            Observation::Updated { movement, .. } => movement.as_ref(),
            _ => None,
        }
    }
}

/// Quotes the snapshot store refuses. Dropped, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteRejection {
    /// Identical quote already seen
    #[error("duplicate quote")]
    Duplicate,

    /// Same key and timestamp as a stored quote but different values
    #[error("conflicting quote for the same observation time")]
    DuplicateConflict,

    /// Older than what the store already holds
    #[error("stale quote observed at {observed_at}, latest is {latest}")]
    Stale {
        observed_at: DateTime<Utc>,
        latest: DateTime<Utc>,
    },
}

impl QuoteRejection {
    pub fn label(&self) -> &'static str {
        match self {
            QuoteRejection::Duplicate => "duplicate",
            QuoteRejection::DuplicateConflict => "duplicate_conflict",
            QuoteRejection::Stale { .. } => "stale",
        }
    }
}
