//! Replay command implementation

use crate::arbitrage::ArbitrageOpportunity;
use crate::config::Config;
use crate::data::{MemorySink, ParquetReader};
use crate::movement::ImpactClass;
use crate::normalize::NormalizeOutcome;
use crate::odds::{GameId, OddsQuote};
use crate::scheduler::{NoSplits, Pipeline};
use crate::sharp::SharpActionSignal;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const REPLAY_SOURCE: &str = "replay";

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Directory containing captured Parquet files
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Output format: json or table
    #[arg(long, default_value = "table")]
    pub format: String,
}

/// Per-game result of a replay
#[derive(Debug, Clone, Serialize)]
pub struct GameReplay {
    pub game_id: GameId,
    pub quotes: usize,
    pub movements: usize,
    pub steam_moves: usize,
    pub sharp_moves: usize,
    pub last_observed_at: DateTime<Utc>,
    pub arbitrage: Vec<ArbitrageOpportunity>,
    pub sharp: SharpActionSignal,
}

/// Replay captured quotes in observation order through a fresh pipeline
pub async fn replay_quotes(config: &Config, mut quotes: Vec<OddsQuote>) -> Vec<GameReplay> {
    quotes.sort_by(|a, b| a.observed_at.cmp(&b.observed_at));

    let sink = Arc::new(MemorySink::new());
    let pipeline = Pipeline::from_config(config, Arc::new(NoSplits), sink.clone());

    let mut last_seen: BTreeMap<GameId, (usize, DateTime<Utc>)> = BTreeMap::new();
    for quote in quotes {
        let game_id = quote.game_id.clone();
        let observed_at = quote.observed_at;
        let outcome = NormalizeOutcome {
            quotes: vec![quote],
            rejected: Vec::new(),
        };
        let report = pipeline.ingest(REPLAY_SOURCE, &game_id, outcome).await;
        let entry = last_seen.entry(game_id).or_insert((0, observed_at));
        entry.0 += report.accepted;
        entry.1 = observed_at;
    }

    let movements = sink.movements();
    let mut results = Vec::with_capacity(last_seen.len());
    for (game_id, (accepted, last_observed_at)) in last_seen {
        let game_moves: Vec<_> = movements.iter().filter(|m| m.game_id == game_id).collect();
        let count = |class: ImpactClass| game_moves.iter().filter(|m| m.impact_class == class).count();

        results.push(GameReplay {
            arbitrage: pipeline.arbitrage(&game_id, last_observed_at),
            sharp: pipeline.sharp_signal(&game_id, last_observed_at).await,
            quotes: accepted,
            movements: game_moves.len(),
            steam_moves: count(ImpactClass::Steam),
            sharp_moves: count(ImpactClass::Sharp),
            last_observed_at,
            game_id,
        });
    }
    results
}

fn load_quotes(data_dir: &Path) -> anyhow::Result<Vec<OddsQuote>> {
    let mut quotes = Vec::new();
    for path in ParquetReader::quote_files(data_dir)? {
        let reader = ParquetReader::new(path);
        let mut batch = reader.read_quotes()?;
        tracing::debug!(path = ?reader.path(), count = batch.len(), "Loaded capture file");
        quotes.append(&mut batch);
    }
    Ok(quotes)
}

impl ReplayArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        tracing::info!("Replaying captured quotes from {:?}...", self.data_dir);

        let quotes = load_quotes(&self.data_dir)?;
        if quotes.is_empty() {
            anyhow::bail!("No captured quotes in {}", self.data_dir.display());
        }
        let total = quotes.len();
        let results = replay_quotes(config, quotes).await;

        match self.format.as_str() {
            "json" => println!("{}", serde_json::to_string_pretty(&results)?),
            _ => {
                println!("Replayed {} quotes across {} games", total, results.len());
                println!(
                    "{:<24} {:>7} {:>9} {:>6} {:>6} {:>5} {:>7}",
                    "GAME", "QUOTES", "MOVEMENTS", "STEAM", "SHARP", "ARBS", "SCORE"
                );
                for game in &results {
                    println!(
                        "{:<24} {:>7} {:>9} {:>6} {:>6} {:>5} {:>7}",
                        game.game_id,
                        game.quotes,
                        game.movements,
                        game.steam_moves,
                        game.sharp_moves,
                        game.arbitrage.len(),
                        game.sharp.score.round_dp(3)
                    );
                    for opp in &game.arbitrage {
                        println!(
                            "    {} {} @ {} {} / {} @ {} {}  margin {}%",
                            opp.market_type,
                            opp.leg_a.side,
                            opp.leg_a.sportsbook,
                            opp.leg_a.odds,
                            opp.leg_b.side,
                            opp.leg_b.sportsbook,
                            opp.leg_b.odds,
                            (opp.profit_margin * rust_decimal_macros::dec!(100)).round_dp(2)
                        );
                    }
                }
            }
        }

        Ok(())
    }
}
