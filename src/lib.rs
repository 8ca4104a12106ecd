//! odds-pipeline: betting-odds market pipeline
//!
//! This library provides the core components for:
//! - Rate-limited, breaker-protected source clients
//! - Normalization of source payloads into canonical American-odds quotes
//! - Per-key snapshot store with deduplication and line movement detection
//! - Cross-book arbitrage scanning
//! - Sharp-action scoring from movement history and betting splits
//! - Per-game, per-source poll scheduling
//! - Data capture to Parquet and replay
//! - Structured logging and Prometheus metrics

pub mod arbitrage;
pub mod cli;
pub mod config;
pub mod data;
pub mod movement;
pub mod normalize;
pub mod odds;
pub mod scheduler;
pub mod sharp;
pub mod source;
pub mod telemetry;
