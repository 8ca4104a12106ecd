//! Configuration types for odds-pipeline

use crate::normalize::SourceKind;
use crate::scheduler::GameState;
use crate::sharp::SharpWeights;
use crate::telemetry::LogFormat;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub arbitrage: ArbitrageConfig,
    #[serde(default)]
    pub sharp: SharpConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Games tracked at startup
    #[serde(default)]
    pub games: Vec<GameConfig>,
}

/// One external odds source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    pub base_url: String,

    /// Inline API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the API key, read when `api_key` is unset
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_rapidapi_host")]
    pub rapidapi_host: String,

    #[serde(default = "default_sport_key")]
    pub sport_key: String,

    #[serde(default = "default_regions")]
    pub regions: String,

    /// Restrict to these bookmakers (empty = all)
    #[serde(default)]
    pub bookmakers: Vec<String>,

    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Per-call timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_rapidapi_host() -> String {
    "tank01-mlb-live-in-game-real-time-statistics.p.rapidapi.com".to_string()
}
fn default_sport_key() -> String {
    "baseball_mlb".to_string()
}
fn default_regions() -> String {
    "us".to_string()
}
fn default_requests_per_minute() -> u32 {
    60
}
fn default_burst() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    10
}

impl SourceConfig {
    /// Source with default limits and no credentials
    pub fn new(name: impl Into<String>, kind: SourceKind, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            base_url: base_url.into(),
            api_key: None,
            api_key_env: None,
            rapidapi_host: default_rapidapi_host(),
            sport_key: default_sport_key(),
            regions: default_regions(),
            bookmakers: Vec::new(),
            requests_per_minute: default_requests_per_minute(),
            burst: default_burst(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Inline key first, then the named environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        self.api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty())
    }
}

/// Poll cadence per game state (seconds)
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_live_secs")]
    pub live_secs: u64,
    #[serde(default = "default_pregame_secs")]
    pub pregame_secs: u64,
    #[serde(default = "default_postgame_secs")]
    pub postgame_secs: u64,
}

fn default_live_secs() -> u64 {
    30
}
fn default_pregame_secs() -> u64 {
    300
}
fn default_postgame_secs() -> u64 {
    3600
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            live_secs: 30,
            pregame_secs: 300,
            postgame_secs: 3600,
        }
    }
}

/// Circuit breaker configuration, shared by all sources
#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds open before one trial call is allowed
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}
fn default_cooldown_secs() -> u64 {
    60
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_secs: 60,
        }
    }
}

/// Movement detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MovementConfig {
    /// Implied probability change at or below which a move is neutral
    #[serde(default = "default_probability_threshold")]
    pub probability_threshold: Decimal,

    /// Line change (points) at or below which a move is neutral
    #[serde(default = "default_line_threshold")]
    pub line_threshold: Decimal,

    /// Cross-book correlation window for steam (seconds)
    #[serde(default = "default_steam_window_secs")]
    pub steam_window_secs: u64,

    /// How long movements are kept for scoring (hours)
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
}

fn default_probability_threshold() -> Decimal {
    Decimal::new(1, 2) // 0.01 = 1%
}
fn default_line_threshold() -> Decimal {
    Decimal::new(5, 1) // 0.5 points
}
fn default_steam_window_secs() -> u64 {
    300
}
fn default_retention_hours() -> u64 {
    24
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            probability_threshold: Decimal::new(1, 2),
            line_threshold: Decimal::new(5, 1),
            steam_window_secs: 300,
            retention_hours: 24,
        }
    }
}

/// Arbitrage scanning configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArbitrageConfig {
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Quotes older than this are ignored (seconds)
    #[serde(default = "default_max_quote_age_secs")]
    pub max_quote_age_secs: u64,

    /// Opportunities must beat this margin
    #[serde(default = "default_min_profit_margin")]
    pub min_profit_margin: Decimal,
}

fn default_scan_interval_secs() -> u64 {
    15
}
fn default_max_quote_age_secs() -> u64 {
    600
}
fn default_min_profit_margin() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 15,
            max_quote_age_secs: 600,
            min_profit_margin: Decimal::new(2, 2),
        }
    }
}

/// Sharp-action scoring configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SharpConfig {
    #[serde(default = "default_window_hours")]
    pub window_hours: u64,

    #[serde(default)]
    pub weights: SharpWeights,

    #[serde(default = "default_steam_saturation")]
    pub steam_saturation: u32,

    #[serde(default = "default_divergence_saturation")]
    pub divergence_saturation: Decimal,
}

fn default_window_hours() -> u64 {
    24
}
fn default_steam_saturation() -> u32 {
    3
}
fn default_divergence_saturation() -> Decimal {
    Decimal::new(20, 2) // 0.20
}

impl Default for SharpConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            weights: SharpWeights::default(),
            steam_saturation: 3,
            divergence_saturation: Decimal::new(20, 2),
        }
    }
}

/// Data capture configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub capture_enabled: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_buffer_size() -> usize {
    1000
}
fn default_flush_interval_secs() -> u64 {
    60
}
fn default_channel_capacity() -> usize {
    10_000
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            capture_enabled: false,
            output_dir: default_output_dir(),
            buffer_size: 1000,
            flush_interval_secs: 60,
            channel_capacity: 10_000,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_metrics_port() -> u16 {
    9090
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

/// A game tracked from startup, with its initial state
#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    pub id: String,
    #[serde(default)]
    pub state: GameState,
}

/// Shipped example configuration, used when no config file can be loaded
pub const EXAMPLE_CONFIG: &str = include_str!("../config.toml.example");

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// The shipped example configuration
    pub fn example() -> anyhow::Result<Self> {
        Ok(toml::from_str(EXAMPLE_CONFIG)?)
    }

    /// Load `path`, falling back to the example configuration
    pub fn load_or_example(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                eprintln!("Warning: Could not load config from {}: {}", path.display(), e);
                eprintln!("Using example configuration");
                Self::example()
            }
        }
    }
}
