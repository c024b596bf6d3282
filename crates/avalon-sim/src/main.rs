//! Avalon simulator entry point.

use std::process::ExitCode;

use avalon_core::clock::SystemClock;
use avalon_core::repository::EventRepository;
use avalon_sim::config::SimConfig;
use avalon_sim::error::AppError;
use avalon_sim::log_repository::{DiscardEventRepository, JsonLinesEventRepository};
use avalon_sim::runner::{Tally, run_all};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Simulator failed");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run() -> Result<(), AppError> {
    // Read configuration from environment.
    let config = SimConfig::from_env()?;
    tracing::info!(
        players = config.game.player_count(),
        games = config.games,
        seed = ?config.seed,
        "Starting Avalon simulator"
    );

    let repo: Box<dyn EventRepository> = match &config.log_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Writing action log");
            Box::new(JsonLinesEventRepository::new(path))
        }
        None => Box::new(DiscardEventRepository),
    };

    let outcomes = run_all(&config, &SystemClock, repo.as_ref()).await?;
    let tally = Tally::of(&outcomes);
    tracing::info!(games = tally.games, wins = ?tally.wins, "Simulation complete");
    Ok(())
}
