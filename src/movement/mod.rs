//! Line movement detection
//!
//! Keeps the last-known quote per (game, book, market), diffs every accepted
//! quote against it and classifies the change as sharp, steam, public or
//! noise.

mod detector;
mod log;
mod store;
mod types;

pub use detector::{
    classify_direction, measure, Measurement, MovementDetector, MovementDetectorConfig,
};
pub use log::MovementLog;
pub use store::{Snapshot, SnapshotStore};
pub use types::{
    Direction, ImpactClass, MarketMovement, MovementBasis, Observation, QuoteRejection,
};
