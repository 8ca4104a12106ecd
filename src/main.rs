use clap::Parser;
use odds_pipeline::cli::{Cli, Commands};
use odds_pipeline::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration, falling back to the shipped example
    let config = Config::load_or_example(&cli.config)?;

    // Initialize telemetry
    odds_pipeline::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting odds pipeline");
            args.execute(&config).await?;
        }
        Commands::Replay(args) => {
            tracing::info!("Starting replay");
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            for source in &config.sources {
                println!(
                    "  Source: {} ({}) {} rpm={} burst={} timeout={}s key={}",
                    source.name,
                    source.kind,
                    source.base_url,
                    source.requests_per_minute,
                    source.burst,
                    source.timeout_secs,
                    if source.resolve_api_key().is_some() { "set" } else { "missing" }
                );
            }
            println!(
                "  Cadence: live={}s pregame={}s postgame={}s",
                config.schedule.live_secs, config.schedule.pregame_secs, config.schedule.postgame_secs
            );
            println!(
                "  Breaker: failures={} cooldown={}s",
                config.breaker.failure_threshold, config.breaker.cooldown_secs
            );
            println!(
                "  Movement: prob={}% line={} steam_window={}s",
                config.movement.probability_threshold * rust_decimal_macros::dec!(100),
                config.movement.line_threshold,
                config.movement.steam_window_secs
            );
            println!(
                "  Arbitrage: every {}s, max_age={}s, min_margin={}%",
                config.arbitrage.scan_interval_secs,
                config.arbitrage.max_quote_age_secs,
                config.arbitrage.min_profit_margin * rust_decimal_macros::dec!(100)
            );
            println!(
                "  Sharp weights: steam={} rlm={} divergence={}",
                config.sharp.weights.steam,
                config.sharp.weights.reverse_line_movement,
                config.sharp.weights.ticket_money_divergence
            );
            println!("  Games: {}", config.games.len());
        }
    }

    Ok(())
}
