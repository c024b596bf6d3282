//! Command handlers for the Session & Progress context.
//!
//! Each state-changing handler takes the game's commit lock, runs the
//! domain call on a staged copy of the game, appends the events the copy
//! produced to the action log and only then swaps the copy in. A failed
//! append leaves the live game exactly as it was.

use avalon_core::aggregate::AggregateRoot;
use avalon_core::clock::Clock;
use avalon_core::command::Command;
use avalon_core::error::DomainError;
use avalon_core::event::DomainEvent;
use avalon_core::repository::{EventRepository, StoredEvent};
use avalon_core::rng::DeterministicRng;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::application::registry::{GameRegistry, GameSession};
use crate::domain::aggregates::{Game, GameSnapshot, RenderedContent, TurnContext};
use crate::domain::commands::{CreateGame, EndGame, PullContent, SweepStage};
use crate::domain::events::SessionEvent;

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct SessionCommandResult {
    /// The game affected or created by the command.
    pub game_id: Uuid,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
}

/// Result of a successful pull.
#[derive(Debug)]
pub struct PullContentResult {
    /// What the player sees.
    pub content: RenderedContent,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
}

/// Result of an explicit sweep.
#[derive(Debug)]
pub struct SweepResult {
    /// Whether the stage moved or the game finished.
    pub advanced: bool,
    /// Whether the game has finished.
    pub end_game: bool,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
}

fn to_stored_event(event: &SessionEvent) -> StoredEvent {
    let meta = event.metadata();
    StoredEvent {
        event_id: meta.event_id,
        aggregate_id: meta.aggregate_id,
        event_type: event.event_type().to_owned(),
        payload: event.to_payload(),
        sequence_number: meta.sequence_number,
        correlation_id: meta.correlation_id,
        occurred_at: meta.occurred_at,
    }
}

fn drain(game: &mut Game) -> Vec<StoredEvent> {
    let stored_events = game
        .uncommitted_events()
        .iter()
        .map(to_stored_event)
        .collect();
    game.clear_uncommitted_events();
    stored_events
}

/// Runs `f` on a staged copy of the game and commits the copy once its
/// events are in the action log.
async fn transact<T>(
    registry: &GameRegistry,
    game_id: Uuid,
    correlation_id: Uuid,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    f: impl FnOnce(&mut Game, &mut TurnContext<'_>) -> Result<T, DomainError>,
) -> Result<(T, Vec<StoredEvent>), DomainError> {
    let slot = registry.get(game_id)?;
    let _writer = slot.commit_lock().lock().await;
    let (mut staged, out) = slot.with(|session| session.run_staged(correlation_id, clock, f))?;
    let stored_events = drain(&mut staged);

    if !stored_events.is_empty() {
        repo.append_events(game_id, &stored_events)
            .await
            .inspect_err(|err| warn!(error = %err, "append failed, change discarded"))?;
    }
    slot.with(|session| {
        session.commit(staged);
        Ok(())
    })?;
    Ok((out, stored_events))
}

/// Handles the `CreateGame` command: deals a new game, persists its
/// creation event and registers it.
///
/// # Errors
///
/// Returns `DomainError::Config` for an invalid configuration and
/// `DomainError::Infrastructure` if the action log rejects the append.
#[instrument(skip_all, fields(command = command.command_type(), players = command.config.player_count()))]
pub async fn handle_create_game(
    command: &CreateGame,
    clock: &dyn Clock,
    mut rng: Box<dyn DeterministicRng>,
    registry: &GameRegistry,
    repo: &dyn EventRepository,
) -> Result<SessionCommandResult, DomainError> {
    let game_id = Uuid::new_v4();
    let mut game = {
        let mut ctx = TurnContext {
            correlation_id: command.correlation_id,
            clock,
            rng: rng.as_mut(),
        };
        Game::new(game_id, command.config.clone(), &mut ctx)?
    };
    let stored_events = drain(&mut game);

    repo.append_events(game_id, &stored_events).await?;
    registry.create(GameSession::new(game, rng))?;

    Ok(SessionCommandResult {
        game_id,
        stored_events,
    })
}

/// Registers a game rebuilt from a snapshot. Nothing is appended; the
/// snapshot's events are already in the log.
///
/// # Errors
///
/// Returns `DomainError::Config` or `DomainError::Protocol` if the
/// snapshot is inconsistent, `DomainError::Protocol` if the game is
/// already live.
pub fn handle_restore_game(
    snapshot: GameSnapshot,
    rng: Box<dyn DeterministicRng>,
    registry: &GameRegistry,
) -> Result<Uuid, DomainError> {
    let game = Game::restore(snapshot)?;
    registry.create(GameSession::new(game, rng))
}

/// Handles the `PullContent` command: serves the player their next
/// entry, applying the attached action first.
///
/// # Errors
///
/// Returns `DomainError::GameNotFound` for an unknown game,
/// `DomainError::Validation` for a rejected action (the game is
/// unchanged), `DomainError::Protocol` for a pull the game cannot serve
/// and `DomainError::Infrastructure` if the append fails (the game and
/// the player's cursor are unchanged and the pull can be retried).
#[instrument(
    skip_all,
    fields(command = command.command_type(), game_id = %command.game_id, player = %command.player)
)]
pub async fn handle_pull(
    command: &PullContent,
    clock: &dyn Clock,
    registry: &GameRegistry,
    repo: &dyn EventRepository,
) -> Result<PullContentResult, DomainError> {
    let (content, stored_events) = transact(
        registry,
        command.game_id,
        command.correlation_id,
        clock,
        repo,
        |game, ctx| game.pull(&command.player, command.action.clone(), ctx),
    )
    .await
    .inspect_err(|err| {
        if err.is_recoverable() {
            warn!(command = command.command_type(), error = %err, "action rejected");
        }
    })?;

    Ok(PullContentResult {
        content,
        stored_events,
    })
}

/// Handles the `SweepStage` command: runs automated players and applies
/// at most one stage transition.
///
/// # Errors
///
/// Returns `DomainError::GameNotFound` for an unknown game,
/// `DomainError::Protocol` if the game state is inconsistent and
/// `DomainError::Infrastructure` if the append fails.
#[instrument(skip_all, fields(command = command.command_type(), game_id = %command.game_id))]
pub async fn handle_sweep(
    command: &SweepStage,
    clock: &dyn Clock,
    registry: &GameRegistry,
    repo: &dyn EventRepository,
) -> Result<SweepResult, DomainError> {
    let ((advanced, end_game), stored_events) = transact(
        registry,
        command.game_id,
        command.correlation_id,
        clock,
        repo,
        |game, ctx| Ok((game.sweep(ctx)?, game.is_end_game())),
    )
    .await?;

    Ok(SweepResult {
        advanced,
        end_game,
        stored_events,
    })
}

/// Handles the `EndGame` command: finishes the game if it is still
/// running, persists the final events and removes it from the registry.
///
/// # Errors
///
/// Returns `DomainError::GameNotFound` for an unknown game and
/// `DomainError::Infrastructure` if the append fails, in which case the
/// game stays registered and running.
#[instrument(skip_all, fields(command = command.command_type(), game_id = %command.game_id))]
pub async fn handle_end_game(
    command: &EndGame,
    clock: &dyn Clock,
    registry: &GameRegistry,
    repo: &dyn EventRepository,
) -> Result<SessionCommandResult, DomainError> {
    let ((), stored_events) = transact(
        registry,
        command.game_id,
        command.correlation_id,
        clock,
        repo,
        |game, ctx| {
            game.abort(ctx);
            Ok(())
        },
    )
    .await?;
    registry.destroy(command.game_id)?;

    Ok(SessionCommandResult {
        game_id: command.game_id,
        stored_events,
    })
}

#[cfg(test)]
mod tests {
    use avalon_core::error::DomainError;
    use avalon_test_support::{
        FailingEventRepository, MockRng, RecordingEventRepository, fixed_clock,
    };
    use uuid::Uuid;

    use crate::application::command_handlers::{
        handle_create_game, handle_end_game, handle_pull, handle_restore_game, handle_sweep,
    };
    use crate::application::registry::GameRegistry;
    use crate::domain::commands::{
        ActionKind, CreateGame, EndGame, PlayerAction, PullContent, SweepStage,
    };
    use crate::domain::config::GameConfig;
    use crate::domain::stage::Stage;
    use crate::domain::state::VoteCard;

    fn create_command(config: GameConfig) -> CreateGame {
        CreateGame {
            correlation_id: Uuid::new_v4(),
            config,
        }
    }

    fn pull(game_id: Uuid, player: &str, action: Option<PlayerAction>) -> PullContent {
        PullContent {
            correlation_id: Uuid::new_v4(),
            game_id,
            player: player.to_owned(),
            action,
        }
    }

    #[tokio::test]
    async fn test_handle_create_game_persists_game_created_event() {
        // Arrange
        let clock = fixed_clock();
        let registry = GameRegistry::new();
        let repo = RecordingEventRepository::new();
        let command = create_command(GameConfig::new(["ann", "bea", "cal", "dee", "eve"]));

        // Act
        let result = handle_create_game(&command, &clock, Box::new(MockRng), &registry, &repo)
            .await
            .unwrap();

        // Assert
        assert_eq!(result.stored_events.len(), 1);
        let appended = repo.appended_batches();
        assert_eq!(appended.len(), 1);
        let (game_id, events) = &appended[0];
        assert_eq!(*game_id, result.game_id);

        let stored = &events[0];
        assert_eq!(stored.event_type, "session.game_created");
        assert_eq!(stored.sequence_number, 1);
        assert_eq!(stored.correlation_id, command.correlation_id);
        assert_eq!(stored.occurred_at, clock.0);
        assert_eq!(registry.ids().unwrap(), vec![result.game_id]);
    }

    #[tokio::test]
    async fn test_handle_create_game_rejects_bad_config_without_registering() {
        let clock = fixed_clock();
        let registry = GameRegistry::new();
        let repo = RecordingEventRepository::new();
        let command = create_command(GameConfig::new(["ann", "ann", "cal", "dee", "eve"]));

        let result =
            handle_create_game(&command, &clock, Box::new(MockRng), &registry, &repo).await;

        assert!(matches!(result, Err(DomainError::Config(_))));
        assert!(registry.ids().unwrap().is_empty());
        assert!(repo.appended_batches().is_empty());
    }

    #[tokio::test]
    async fn test_handle_create_game_surfaces_log_failure() {
        let clock = fixed_clock();
        let registry = GameRegistry::new();
        let command = create_command(GameConfig::new(["ann", "bea", "cal", "dee", "eve"]));

        let result = handle_create_game(
            &command,
            &clock,
            Box::new(MockRng),
            &registry,
            &FailingEventRepository,
        )
        .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert!(registry.ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_pull_returns_not_found_for_unknown_game() {
        let clock = fixed_clock();
        let registry = GameRegistry::new();
        let repo = RecordingEventRepository::new();
        let game_id = Uuid::new_v4();

        let result = handle_pull(&pull(game_id, "ann", None), &clock, &registry, &repo).await;

        match result.unwrap_err() {
            DomainError::GameNotFound(id) => assert_eq!(id, game_id),
            other => panic!("expected GameNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_pull_serves_content_and_persists_stage_events() {
        // Arrange
        let clock = fixed_clock();
        let registry = GameRegistry::new();
        let repo = RecordingEventRepository::new();
        let command = create_command(GameConfig::new(["ann"]).with_automated(4));
        let game_id = handle_create_game(&command, &clock, Box::new(MockRng), &registry, &repo)
            .await
            .unwrap()
            .game_id;

        // Act
        let first = handle_pull(&pull(game_id, "ann", None), &clock, &registry, &repo)
            .await
            .unwrap();
        for _ in 0..3 {
            handle_pull(&pull(game_id, "ann", None), &clock, &registry, &repo)
                .await
                .unwrap();
        }

        // Assert
        assert_eq!(first.content.body.to_string(), "Hi ann, welcome to Avalon.");
        assert!(first.stored_events.is_empty());
        let types = repo.event_types(game_id);
        assert!(types.contains(&"session.stage_advanced".to_owned()));
        let stage = registry
            .with_session(game_id, |s| Ok(s.game().current_stage()))
            .unwrap();
        assert_ne!(stage, Stage::Init);
    }

    #[tokio::test]
    async fn test_handle_pull_rejected_action_appends_nothing() {
        let clock = fixed_clock();
        let registry = GameRegistry::new();
        let repo = RecordingEventRepository::new();
        let command = create_command(GameConfig::new(["ann", "bea", "cal", "dee", "eve"]));
        let game_id = handle_create_game(&command, &clock, Box::new(MockRng), &registry, &repo)
            .await
            .unwrap()
            .game_id;
        let batches_before = repo.appended_batches().len();

        let result = handle_pull(
            &pull(
                game_id,
                "ann",
                Some(PlayerAction::VoteQuest {
                    vote: VoteCard::Approve,
                }),
            ),
            &clock,
            &registry,
            &repo,
        )
        .await;

        assert!(result.unwrap_err().is_recoverable());
        assert_eq!(repo.appended_batches().len(), batches_before);
    }

    #[tokio::test]
    async fn test_handle_sweep_drives_an_all_automated_game_to_the_end() {
        let clock = fixed_clock();
        let registry = GameRegistry::new();
        let repo = RecordingEventRepository::new();
        let command = create_command(GameConfig::new(Vec::<String>::new()).with_automated(6));
        let game_id = handle_create_game(&command, &clock, Box::new(MockRng), &registry, &repo)
            .await
            .unwrap()
            .game_id;
        let sweep = SweepStage {
            correlation_id: Uuid::new_v4(),
            game_id,
        };

        let mut finished = false;
        for _ in 0..500 {
            if handle_sweep(&sweep, &clock, &registry, &repo)
                .await
                .unwrap()
                .end_game
            {
                finished = true;
                break;
            }
        }

        assert!(finished);
        let types = repo.event_types(game_id);
        assert_eq!(types.last().map(String::as_str), Some("session.game_ended"));
        let sequence: Vec<i64> = repo
            .appended_batches()
            .iter()
            .flat_map(|(_, events)| events.iter().map(|e| e.sequence_number))
            .collect();
        let expected: Vec<i64> = (1..=i64::try_from(sequence.len()).unwrap()).collect();
        assert_eq!(sequence, expected, "sequence numbers are gapless");
    }

    #[tokio::test]
    async fn test_handle_end_game_finishes_and_destroys() {
        let clock = fixed_clock();
        let registry = GameRegistry::new();
        let repo = RecordingEventRepository::new();
        let command = create_command(GameConfig::new(["ann", "bea", "cal", "dee", "eve"]));
        let game_id = handle_create_game(&command, &clock, Box::new(MockRng), &registry, &repo)
            .await
            .unwrap()
            .game_id;

        let end = EndGame {
            correlation_id: Uuid::new_v4(),
            game_id,
        };
        let result = handle_end_game(&end, &clock, &registry, &repo)
            .await
            .unwrap();

        assert_eq!(result.stored_events.len(), 1);
        assert_eq!(result.stored_events[0].event_type, "session.game_ended");
        assert!(registry.ids().unwrap().is_empty());
        assert!(matches!(
            handle_end_game(&end, &clock, &registry, &repo).await,
            Err(DomainError::GameNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_handle_restore_game_registers_snapshot() {
        let clock = fixed_clock();
        let registry = GameRegistry::new();
        let repo = RecordingEventRepository::new();
        let command = create_command(GameConfig::new(["ann", "bea", "cal", "dee", "eve"]));
        let game_id = handle_create_game(&command, &clock, Box::new(MockRng), &registry, &repo)
            .await
            .unwrap()
            .game_id;
        let snapshot = registry
            .with_session(game_id, |s| Ok(s.game().snapshot()))
            .unwrap();
        registry.destroy(game_id).unwrap();

        let restored = handle_restore_game(snapshot, Box::new(MockRng), &registry).unwrap();

        assert_eq!(restored, game_id);
        let version = registry.with_session(game_id, |s| Ok(s.game().version)).unwrap();
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn test_handle_pull_failed_append_leaves_game_unchanged() {
        // Arrange
        let clock = fixed_clock();
        let registry = GameRegistry::new();
        let repo = RecordingEventRepository::new();
        let command = create_command(GameConfig::new(["ann"]).with_automated(4));
        let game_id = handle_create_game(&command, &clock, Box::new(MockRng), &registry, &repo)
            .await
            .unwrap()
            .game_id;
        let snapshot = || {
            registry
                .with_session(game_id, |s| Ok(s.game().snapshot()))
                .unwrap()
        };

        // Act: pulls that emit nothing never touch the log; the one that
        // closes the init stage does.
        let mut failure = None;
        for _ in 0..10 {
            let before = snapshot();
            match handle_pull(
                &pull(game_id, "ann", None),
                &clock,
                &registry,
                &FailingEventRepository,
            )
            .await
            {
                Ok(result) => assert!(result.stored_events.is_empty()),
                Err(err) => {
                    failure = Some((err, before));
                    break;
                }
            }
        }

        // Assert
        let (err, before) = failure.expect("the init stage never closed");
        assert!(matches!(err, DomainError::Infrastructure(_)));
        assert_eq!(snapshot(), before);
        assert_eq!(before.state.stage, Stage::Init);
        assert_eq!(repo.event_types(game_id), vec!["session.game_created"]);

        let retried = handle_pull(&pull(game_id, "ann", None), &clock, &registry, &repo)
            .await
            .unwrap();
        assert_eq!(retried.stored_events[0].event_type, "session.stage_advanced");
        assert_eq!(retried.stored_events[0].sequence_number, 2);
        assert_ne!(snapshot().state.stage, Stage::Init);
    }

    #[tokio::test]
    async fn test_handle_pull_accepts_a_resent_vote() {
        let clock = fixed_clock();
        let registry = GameRegistry::new();
        let repo = RecordingEventRepository::new();
        let command = create_command(GameConfig::new(["ann"]).with_automated(4));
        let game_id = handle_create_game(&command, &clock, Box::new(MockRng), &registry, &repo)
            .await
            .unwrap()
            .game_id;

        let mut action = None;
        let mut reached_vote = false;
        for _ in 0..60 {
            let command = pull(game_id, "ann", action.take());
            let result = handle_pull(&command, &clock, &registry, &repo)
                .await
                .unwrap();
            match result.content.pending_action {
                Some(ActionKind::VoteQuest) => {
                    reached_vote = true;
                    break;
                }
                Some(ActionKind::ProposeQuest) => {
                    let members = registry
                        .with_session(game_id, |s| {
                            let game = s.game();
                            Ok(game
                                .roster()
                                .names()
                                .into_iter()
                                .take(game.state().n_members)
                                .collect())
                        })
                        .unwrap();
                    action = Some(PlayerAction::ProposeQuest { members });
                }
                Some(other) => panic!("unexpected {other} before the vote"),
                None => {}
            }
        }
        assert!(reached_vote);

        let vote = || {
            Some(PlayerAction::VoteQuest {
                vote: VoteCard::Approve,
            })
        };
        let first = handle_pull(&pull(game_id, "ann", vote()), &clock, &registry, &repo)
            .await
            .unwrap();
        let resent = handle_pull(&pull(game_id, "ann", vote()), &clock, &registry, &repo)
            .await
            .unwrap();

        assert!(
            first
                .stored_events
                .iter()
                .any(|e| e.event_type == "session.vote_cast")
        );
        assert!(resent.stored_events.is_empty(), "the vote had already closed");
        let ann_votes = repo
            .appended_batches()
            .iter()
            .flat_map(|(_, events)| events.iter())
            .filter(|e| {
                e.event_type == "session.vote_cast" && e.payload["VoteCast"]["player"] == "ann"
            })
            .count();
        assert_eq!(ann_votes, 1);
    }
}
