//! Collection scheduling
//!
//! [`Scheduler`] runs one timer per (source, game) at a cadence set by the
//! game's state and fans fetched payloads into the shared [`Pipeline`].

mod pipeline;
mod providers;
mod runner;
mod types;

pub use pipeline::Pipeline;
pub use providers::{
    BettingSplitsProvider, GameStatusProvider, NoSplits, StaticGameStatus, StaticSplits,
};
pub use runner::Scheduler;
pub use types::{Cadence, GameState, PipelineEvent, PollReport};
