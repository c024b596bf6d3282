//! Drives fully automated games to their end through the session
//! handlers.

use std::collections::BTreeMap;

use avalon_core::clock::Clock;
use avalon_core::error::DomainError;
use avalon_core::repository::EventRepository;
use avalon_core::rng::{DeterministicRng, SeededRng};
use avalon_session::application::command_handlers::{
    handle_create_game, handle_end_game, handle_sweep,
};
use avalon_session::application::query_handlers::{get_game_status, get_moderator_overview};
use avalon_session::application::registry::GameRegistry;
use avalon_session::domain::commands::{CreateGame, EndGame, SweepStage};
use avalon_session::domain::config::GameConfig;
use avalon_session::domain::roles::Side;
use avalon_session::domain::state::QuestResult;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::error::AppError;

/// Upper bound on sweeps for one game. A game needs at most a few per
/// round and never more than 25 rounds.
const MAX_SWEEPS: usize = 1_000;

/// How one game ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOutcome {
    pub game_id: Uuid,
    pub winner: Option<Side>,
    pub quest_results: Vec<QuestResult>,
    /// Events appended to the action log for this game.
    pub events: usize,
}

/// Plays one automated game from creation to teardown.
///
/// # Errors
///
/// Returns `DomainError` if the game cannot be created, a handler fails,
/// or the game does not finish within the sweep budget.
pub async fn run_game(
    config: &GameConfig,
    rng: Box<dyn DeterministicRng>,
    clock: &dyn Clock,
    registry: &GameRegistry,
    repo: &dyn EventRepository,
) -> Result<GameOutcome, DomainError> {
    let correlation_id = Uuid::new_v4();
    let created = handle_create_game(
        &CreateGame {
            correlation_id,
            config: config.clone(),
        },
        clock,
        rng,
        registry,
        repo,
    )
    .await?;
    let game_id = created.game_id;
    let mut events = created.stored_events.len();

    let sweep = SweepStage {
        correlation_id,
        game_id,
    };
    let mut finished = false;
    for _ in 0..MAX_SWEEPS {
        let result = handle_sweep(&sweep, clock, registry, repo).await?;
        events += result.stored_events.len();
        if result.end_game {
            finished = true;
            break;
        }
    }
    if !finished {
        return Err(DomainError::Protocol(format!(
            "game {game_id} did not finish within {MAX_SWEEPS} sweeps"
        )));
    }

    let status = get_game_status(registry, game_id)?;
    debug!(
        game_id = %game_id,
        overview = %get_moderator_overview(registry, game_id)?,
        "final table"
    );
    let ended = handle_end_game(
        &EndGame {
            correlation_id,
            game_id,
        },
        clock,
        registry,
        repo,
    )
    .await?;
    events += ended.stored_events.len();

    Ok(GameOutcome {
        game_id,
        winner: status.winner,
        quest_results: status.quest_results,
        events,
    })
}

/// Wins per side over a batch of games.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub games: usize,
    pub wins: BTreeMap<String, usize>,
}

impl Tally {
    #[must_use]
    pub fn of(outcomes: &[GameOutcome]) -> Self {
        let mut wins = BTreeMap::new();
        for outcome in outcomes {
            let key = outcome
                .winner
                .map_or_else(|| "undecided".to_owned(), |side| side.to_string());
            *wins.entry(key).or_insert(0) += 1;
        }
        Self {
            games: outcomes.len(),
            wins,
        }
    }
}

/// Plays every game `sim` asks for, one after another.
///
/// # Errors
///
/// Returns `AppError::Domain` on the first game that fails.
pub async fn run_all(
    sim: &SimConfig,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<Vec<GameOutcome>, AppError> {
    let registry = GameRegistry::new();
    let mut outcomes = Vec::with_capacity(sim.games);
    for idx in 0..sim.games {
        let rng: Box<dyn DeterministicRng> = match sim.seed {
            Some(seed) => {
                let offset = u64::try_from(idx).unwrap_or(u64::MAX);
                Box::new(SeededRng::from_seed(seed.wrapping_add(offset)))
            }
            None => Box::new(SeededRng::from_entropy()),
        };
        let outcome = run_game(&sim.game, rng, clock, &registry, repo).await?;
        info!(
            game_id = %outcome.game_id,
            winner = ?outcome.winner,
            quests = ?outcome.quest_results,
            events = outcome.events,
            "game finished"
        );
        outcomes.push(outcome);
    }
    Ok(outcomes)
}
