//! Sharp-action scoring
//!
//! Aggregates movement history and public betting splits into a single
//! advisory signal per game.

mod scorer;
mod types;

pub use scorer::{SharpScorer, SharpScorerConfig};
pub use types::{SharpActionSignal, SharpIndicators, SharpWeights};
