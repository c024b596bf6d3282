//! Integration tests: whole games played by concurrent clients through the
//! application handlers.

use std::sync::Arc;

use avalon_core::clock::Clock;
use avalon_core::rng::SeededRng;
use avalon_session::application::command_handlers::{
    handle_create_game, handle_pull, handle_sweep,
};
use avalon_session::application::query_handlers::{
    get_game_status, get_pending_action, get_snapshot,
};
use avalon_session::application::registry::GameRegistry;
use avalon_session::domain::commands::{
    ActionKind, CreateGame, PlayerAction, PullContent, SweepStage,
};
use avalon_session::domain::config::GameConfig;
use avalon_session::domain::state::{QuestCard, VoteCard};
use avalon_test_support::{FixedClock, MockRng, RecordingEventRepository, fixed_clock};
use uuid::Uuid;

struct Table {
    clock: FixedClock,
    registry: GameRegistry,
    repo: RecordingEventRepository,
}

/// Answers whatever the next entry expects: approve every team, play
/// success, pass the lady of the lake, and shoot the first other seat.
fn answer(table: &Table, game_id: Uuid, player: &str, kind: ActionKind) -> PlayerAction {
    let snapshot = get_snapshot(&table.registry, game_id).unwrap();
    let names: Vec<String> = snapshot.players.iter().map(|p| p.name.clone()).collect();
    match kind {
        ActionKind::ProposeQuest => PlayerAction::ProposeQuest {
            members: names.into_iter().take(snapshot.state.n_members).collect(),
        },
        ActionKind::VoteQuest => PlayerAction::VoteQuest {
            vote: VoteCard::Approve,
        },
        ActionKind::DoQuest => PlayerAction::DoQuest {
            attempt: Some(QuestCard::Success),
        },
        ActionKind::UseLakeLadyPower => PlayerAction::UseLakeLadyPower { target: None },
        ActionKind::Assassinate => PlayerAction::Assassinate {
            target: names.into_iter().find(|n| n != player).unwrap(),
        },
    }
}

/// Pulls for `player` until the game ends, answering action entries.
async fn play(table: Arc<Table>, game_id: Uuid, player: String) -> usize {
    let clock: &dyn Clock = &table.clock;
    let mut next: Option<ActionKind> = None;
    for pulls in 0..20_000 {
        if get_game_status(&table.registry, game_id).unwrap().end_game {
            return pulls;
        }
        let action = next.map(|kind| answer(&table, game_id, &player, kind));
        let command = PullContent {
            correlation_id: Uuid::new_v4(),
            game_id,
            player: player.clone(),
            action,
        };
        let result = match handle_pull(&command, clock, &table.registry, &table.repo).await {
            Ok(result) => result,
            Err(err) if err.is_recoverable() => {
                next = get_pending_action(&table.registry, game_id, &player).unwrap();
                continue;
            }
            Err(err) => panic!("{player}: {err}"),
        };
        next = result.content.pending_action;
        if result.content.waiting {
            tokio::task::yield_now().await;
        }
    }
    panic!("{player} never saw the game end");
}

async fn create(table: &Table, config: GameConfig) -> Uuid {
    let command = CreateGame {
        correlation_id: Uuid::new_v4(),
        config,
    };
    handle_create_game(
        &command,
        &table.clock,
        Box::new(MockRng),
        &table.registry,
        &table.repo,
    )
    .await
    .unwrap()
    .game_id
}

async fn play_to_the_end(config: GameConfig) -> (Arc<Table>, Uuid) {
    let table = Arc::new(Table {
        clock: fixed_clock(),
        registry: GameRegistry::new(),
        repo: RecordingEventRepository::new(),
    });
    let humans = config.players.clone();
    let game_id = create(&table, config).await;

    let mut tasks = Vec::new();
    for human in humans {
        tasks.push(tokio::spawn(play(Arc::clone(&table), game_id, human)));
    }
    for task in tasks {
        task.await.unwrap();
    }
    (table, game_id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_five_humans_play_concurrently_to_the_end() {
    let (table, game_id) =
        play_to_the_end(GameConfig::new(["ann", "bea", "cal", "dee", "eve"])).await;

    let status = get_game_status(&table.registry, game_id).unwrap();
    assert!(status.end_game);
    assert!(status.winner.is_some());
    assert_eq!(status.quest_results.len(), 3, "every quest succeeds");

    let types = table.repo.event_types(game_id);
    assert_eq!(types.first().map(String::as_str), Some("session.game_created"));
    assert_eq!(types.last().map(String::as_str), Some("session.game_ended"));
    assert!(types.contains(&"session.assassination_attempted".to_owned()));
    assert_eq!(
        types
            .iter()
            .filter(|t| *t == "session.vote_cast")
            .count(),
        15
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_table_with_lake_lady_and_optional_roles() {
    let config = GameConfig::new(["ann", "bea", "cal"])
        .with_automated(5)
        .with_percival()
        .with_morgana()
        .with_lake_lady();
    let (table, game_id) = play_to_the_end(config).await;

    let status = get_game_status(&table.registry, game_id).unwrap();
    assert!(status.end_game);
    assert!(status.winner.is_some());

    let sequence: Vec<i64> = table
        .repo
        .appended_batches()
        .iter()
        .flat_map(|(_, events)| events.iter().map(|e| e.sequence_number))
        .collect();
    let mut sorted = sequence.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), sequence.len(), "no sequence number is reused");
}

#[tokio::test]
async fn test_seeded_automated_games_replay_identically() {
    let clock = fixed_clock();
    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let registry = GameRegistry::new();
        let repo = RecordingEventRepository::new();
        let command = CreateGame {
            correlation_id: Uuid::nil(),
            config: GameConfig::new(Vec::<String>::new())
                .with_automated(7)
                .with_oberon()
                .with_lake_lady(),
        };
        let game_id = handle_create_game(
            &command,
            &clock,
            Box::new(SeededRng::from_seed(7)),
            &registry,
            &repo,
        )
        .await
        .unwrap()
        .game_id;
        let sweep = SweepStage {
            correlation_id: Uuid::nil(),
            game_id,
        };
        for _ in 0..1_000 {
            let result = handle_sweep(&sweep, &clock, &registry, &repo)
                .await
                .unwrap();
            if result.end_game {
                break;
            }
        }
        let status = get_game_status(&registry, game_id).unwrap();
        outcomes.push((status.quest_results, status.winner, repo.event_types(game_id)));
    }
    assert_eq!(outcomes[0], outcomes[1]);
}
