//! Query handlers for the Session & Progress context.
//!
//! Read-only views over live games. Every query takes the game's lock
//! only for as long as it needs to copy or render what it returns.

use avalon_core::error::DomainError;
use serde::Serialize;
use uuid::Uuid;

use crate::application::registry::GameRegistry;
use crate::domain::aggregates::GameSnapshot;
use crate::domain::commands::ActionKind;
use crate::domain::roles::Side;
use crate::domain::stage::Stage;
use crate::domain::state::QuestResult;

/// Read-only view of where a game stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameStatusView {
    pub game_id: Uuid,
    pub stage: Stage,
    pub quest: usize,
    pub round: usize,
    pub leader: String,
    pub quest_results: Vec<QuestResult>,
    /// Decided winner, if any.
    pub winner: Option<Side>,
    pub end_game: bool,
    /// Number of events handed off to the action log.
    pub version: i64,
}

/// Retrieves the status of a live game.
///
/// # Errors
///
/// Returns `DomainError::GameNotFound` if no game is registered under the
/// identifier.
pub fn get_game_status(
    registry: &GameRegistry,
    game_id: Uuid,
) -> Result<GameStatusView, DomainError> {
    registry.with_session(game_id, |session| {
        let game = session.game();
        let state = game.state();
        Ok(GameStatusView {
            game_id,
            stage: state.stage,
            quest: state.quest,
            round: state.round,
            leader: state.leader.clone(),
            quest_results: state.quest_results.clone(),
            winner: game.winner(),
            end_game: game.is_end_game(),
            version: game.version,
        })
    })
}

/// The framed game info summary.
///
/// # Errors
///
/// Returns `DomainError::GameNotFound` for an unknown game.
pub fn get_game_info(registry: &GameRegistry, game_id: Uuid) -> Result<String, DomainError> {
    registry.with_session(game_id, |session| Ok(session.game().game_info_summary()))
}

/// The table as one player is allowed to see it.
///
/// # Errors
///
/// Returns `DomainError::GameNotFound` for an unknown game and
/// `DomainError::Protocol` for an unknown viewer.
pub fn get_player_info(
    registry: &GameRegistry,
    game_id: Uuid,
    viewer: &str,
) -> Result<String, DomainError> {
    registry.with_session(game_id, |session| session.game().player_info_view(viewer))
}

/// Recorded rounds for one viewer, optionally revealing sides.
///
/// # Errors
///
/// Returns `DomainError::GameNotFound` for an unknown game and
/// `DomainError::Protocol` for an unknown viewer.
pub fn get_history(
    registry: &GameRegistry,
    game_id: Uuid,
    viewer: &str,
    reveal: bool,
) -> Result<String, DomainError> {
    registry.with_session(game_id, |session| session.game().history_view(viewer, reveal))
}

/// Full table with every character and knowledge map.
///
/// # Errors
///
/// Returns `DomainError::GameNotFound` for an unknown game.
pub fn get_moderator_overview(
    registry: &GameRegistry,
    game_id: Uuid,
) -> Result<String, DomainError> {
    registry.with_session(game_id, |session| {
        Ok(session.game().moderator_overview().to_string())
    })
}

/// The action `player`'s next entry expects, if any.
///
/// # Errors
///
/// Returns `DomainError::GameNotFound` for an unknown game.
pub fn get_pending_action(
    registry: &GameRegistry,
    game_id: Uuid,
    player: &str,
) -> Result<Option<ActionKind>, DomainError> {
    registry.with_session(game_id, |session| Ok(session.game().next_action(player)))
}

/// A snapshot of the game for persistence or transfer.
///
/// # Errors
///
/// Returns `DomainError::GameNotFound` for an unknown game.
pub fn get_snapshot(registry: &GameRegistry, game_id: Uuid) -> Result<GameSnapshot, DomainError> {
    registry.with_session(game_id, |session| Ok(session.game().snapshot()))
}
