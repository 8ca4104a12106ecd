//! Data capture module
//!
//! Append-only sinks for accepted quotes and detected movements, with a
//! Parquet recorder for replay.

mod parquet;
mod recorder;

pub use parquet::{ParquetReader, ParquetWriter};
pub use recorder::{DataRecorder, RecorderConfig, RecorderStats};

use crate::movement::MarketMovement;
use crate::odds::OddsQuote;
use parking_lot::Mutex;
use std::sync::Arc;

/// Destination for accepted quotes and movements. Appends must not block.
pub trait OddsSink: Send + Sync {
    fn append_quote(&self, quote: Arc<OddsQuote>);
    fn append_movement(&self, movement: Arc<MarketMovement>);
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullSink;

impl OddsSink for NullSink {
    fn append_quote(&self, _quote: Arc<OddsQuote>) {}
    fn append_movement(&self, _movement: Arc<MarketMovement>) {}
}

/// Keeps everything in memory, in append order
#[derive(Debug, Default)]
pub struct MemorySink {
    quotes: Mutex<Vec<Arc<OddsQuote>>>,
    movements: Mutex<Vec<Arc<MarketMovement>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quotes(&self) -> Vec<Arc<OddsQuote>> {
        self.quotes.lock().clone()
    }

    pub fn movements(&self) -> Vec<Arc<MarketMovement>> {
        self.movements.lock().clone()
    }
}

impl OddsSink for MemorySink {
    fn append_quote(&self, quote: Arc<OddsQuote>) {
        self.quotes.lock().push(quote);
    }

    fn append_movement(&self, movement: Arc<MarketMovement>) {
        self.movements.lock().push(movement);
    }
}
