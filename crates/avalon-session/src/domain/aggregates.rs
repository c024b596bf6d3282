//! Aggregate roots for the Session & Progress context.

use avalon_core::aggregate::AggregateRoot;
use avalon_core::clock::Clock;
use avalon_core::error::DomainError;
use avalon_core::event::EventMetadata;
use avalon_core::rng::DeterministicRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::commands::{ActionKind, PlayerAction};
use super::config::GameConfig;
use super::content::{MessagePacks, View};
use super::events::{GameCreated, GameEnded, SessionEvent, SessionEventKind, StageAdvanced};
use super::history::History;
use super::render::{self, ContentBody, TextTable};
use super::roles::{Player, Roster, Side, assign_roles, pick_automated_names};
use super::schedule::QuestSchedule;
use super::stage::{self, Stage, Transition};
use super::state::{GameState, Progress};

/// Collaborators every state-changing call needs.
pub struct TurnContext<'a> {
    /// Stamped on every event the call emits.
    pub correlation_id: Uuid,
    /// Source of event and history timestamps.
    pub clock: &'a dyn Clock,
    /// Source of every random choice.
    pub rng: &'a mut dyn DeterministicRng,
}

/// What a pull hands back to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedContent {
    /// Stage of the entry that was rendered.
    pub stage: Stage,
    /// Step of the entry that was rendered.
    pub step: usize,
    pub body: ContentBody,
    /// The player is held on this entry and should pull again later.
    pub waiting: bool,
    /// Action the player's next entry expects, if any.
    pub pending_action: Option<ActionKind>,
}

/// Serializable image of a game, enough to rebuild it exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub id: Uuid,
    pub version: i64,
    pub config: GameConfig,
    pub players: Vec<Player>,
    pub state: GameState,
    pub history: History,
}

/// The aggregate root for one game of Avalon.
#[derive(Debug, Clone)]
pub struct Game {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Number of events already handed off for persistence.
    pub version: i64,
    pub(crate) config: GameConfig,
    pub(crate) schedule: QuestSchedule,
    pub(crate) roster: Roster,
    pub(crate) state: GameState,
    pub(crate) history: History,
    packs: MessagePacks,
    uncommitted_events: Vec<SessionEvent>,
}

impl Game {
    /// Validates `config`, seats the players, deals the characters and
    /// opens the game at the init stage.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Config` if the configuration is invalid; no
    /// game is created.
    pub fn new(id: Uuid, config: GameConfig, ctx: &mut TurnContext<'_>) -> Result<Self, DomainError> {
        config.validate()?;
        let schedule = QuestSchedule::for_players(config.player_count()).ok_or_else(|| {
            DomainError::Config(format!(
                "no quest schedule for {} players",
                config.player_count()
            ))
        })?;

        let automated =
            pick_automated_names(&config.players, config.automated_players, &mut *ctx.rng);
        let roster = assign_roles(&config, &automated, &mut *ctx.rng);
        let state = GameState::new(&roster, &schedule, config.has_lake_lady)?;
        let packs = MessagePacks::build(config.has_lake_lady);

        let mut game = Self {
            id,
            version: 0,
            config,
            schedule,
            roster,
            state,
            history: History::new(),
            packs,
            uncommitted_events: Vec::new(),
        };

        let created = GameCreated {
            seats: game.roster.names(),
            automated,
            leader: game.state.leader.clone(),
            lake_lady: game.state.lake_lady_holder().map(str::to_owned),
        };
        info!(
            game_id = %id,
            players = game.roster.len(),
            leader = %created.leader,
            "game created"
        );
        game.record_event(SessionEventKind::GameCreated(created), ctx);
        Ok(game)
    }

    /// Rebuilds a game from a snapshot. Content lists are rebuilt from the
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Config` if the stored configuration is invalid
    /// and `DomainError::Protocol` if the players do not match it.
    pub fn restore(snapshot: GameSnapshot) -> Result<Self, DomainError> {
        snapshot.config.validate()?;
        let schedule = QuestSchedule::for_players(snapshot.config.player_count())
            .ok_or_else(|| DomainError::Config("no quest schedule".to_owned()))?;
        if snapshot.players.len() != snapshot.config.player_count() {
            return Err(DomainError::Protocol(format!(
                "snapshot has {} players, configuration expects {}",
                snapshot.players.len(),
                snapshot.config.player_count()
            )));
        }
        let packs = MessagePacks::build(snapshot.config.has_lake_lady);
        Ok(Self {
            id: snapshot.id,
            version: snapshot.version,
            config: snapshot.config,
            schedule,
            roster: Roster::new(snapshot.players),
            state: snapshot.state,
            history: snapshot.history,
            packs,
            uncommitted_events: Vec::new(),
        })
    }

    /// Captures the game for persistence or transfer.
    #[must_use]
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            id: self.id,
            version: self.version,
            config: self.config.clone(),
            players: self.roster.players().to_vec(),
            state: self.state.clone(),
            history: self.history.clone(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    #[must_use]
    pub fn schedule(&self) -> &QuestSchedule {
        &self.schedule
    }

    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    #[must_use]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn packs(&self) -> &MessagePacks {
        &self.packs
    }

    /// Whether the game has run past its final stage.
    #[must_use]
    pub fn is_end_game(&self) -> bool {
        self.state.end_game
    }

    /// The shared stage.
    #[must_use]
    pub fn current_stage(&self) -> Stage {
        self.state.stage
    }

    /// The winning side, once decided.
    #[must_use]
    pub fn winner(&self) -> Option<Side> {
        self.state.winner()
    }

    /// Table setup and current position.
    #[must_use]
    pub fn game_info_summary(&self) -> String {
        render::game_info_summary(self)
    }

    /// The table as `viewer` is allowed to see it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Protocol` for an unknown viewer.
    pub fn player_info_view(&self, viewer: &str) -> Result<String, DomainError> {
        render::player_info_view(self, viewer).map(|t| t.to_string())
    }

    /// Recorded rounds, optionally revealing sides and who failed.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Protocol` for an unknown viewer.
    pub fn history_view(&self, viewer: &str, reveal: bool) -> Result<String, DomainError> {
        if !self.roster.contains(viewer) {
            return Err(DomainError::Protocol(format!("unknown player {viewer}")));
        }
        Ok(render::history_view(self, viewer, reveal).to_string())
    }

    /// Everything about every seat.
    #[must_use]
    pub fn moderator_overview(&self) -> TextTable {
        render::moderator_overview(self)
    }

    /// Serves `player` their next applicable entry.
    ///
    /// Entries whose guard fails are skipped for good once the pull
    /// succeeds. If the entry takes an action the payload is validated and
    /// applied first. The cursor
    /// then moves one step unless the entry holds the player on a wait;
    /// a cursor left behind by a stage change jumps to the start of the
    /// current stage instead. Every pull ends with a sweep.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Protocol` for unknown or automated players and
    /// `DomainError::Validation` for a rejected or missing action payload,
    /// in which case the shared state is unchanged.
    pub fn pull(
        &mut self,
        player: &str,
        action: Option<PlayerAction>,
        ctx: &mut TurnContext<'_>,
    ) -> Result<RenderedContent, DomainError> {
        let mut cursor = self.state.progress.get(player).copied().ok_or_else(|| {
            DomainError::Protocol(format!("{player} is not a tracked player of this game"))
        })?;

        let entry = {
            let view = View::new(self, player);
            let entries = self.packs.entries(cursor.stage);
            loop {
                let entry = entries.get(cursor.step).ok_or_else(|| {
                    DomainError::Protocol(format!(
                        "{player} ran off the {} content at step {}",
                        cursor.stage, cursor.step
                    ))
                })?;
                if entry.applies(&view) {
                    break *entry;
                }
                cursor.step += 1;
            }
        };

        // A resend of an answer already taken this stage goes back to its
        // handler; the cursor stays put if this entry wants its own answer.
        let mut hold = false;
        match (entry.action, action) {
            (Some(expected), Some(action)) if action.kind() == expected => {
                self.apply_action(player, action, ctx)?;
            }
            (expected, Some(action)) if self.is_resubmission(player, &action) => {
                self.apply_action(player, action, ctx)?;
                hold = expected.is_some();
            }
            (Some(expected), Some(action)) => {
                return Err(DomainError::Validation(format!(
                    "expected {expected}, got {}",
                    action.kind()
                )));
            }
            (Some(ActionKind::DoQuest), None)
                if self.roster.side_of(player) == Some(Side::Good) =>
            {
                self.do_quest(player, None, ctx)?;
            }
            (Some(expected), None) => {
                return Err(DomainError::Validation(format!(
                    "{expected} needs an answer"
                )));
            }
            (None, Some(action)) => {
                return Err(DomainError::Validation(format!(
                    "no action is expected here, got {}",
                    action.kind()
                )));
            }
            (None, None) => {}
        }
        self.state.progress.insert(player.to_owned(), cursor);

        let body = render::render_content(&entry.content, &View::new(self, player))?;
        let waiting = entry.is_waiting(&self.state);
        let rendered_at = cursor;

        if !waiting && !hold {
            if cursor.stage == self.state.stage {
                cursor.step = (cursor.step + 1).min(self.packs.last_step(cursor.stage));
            } else {
                cursor = Progress::start_of(self.state.stage);
            }
            self.state.progress.insert(player.to_owned(), cursor);
        }
        debug!(
            game_id = %self.id,
            player,
            stage = %cursor.stage,
            step = cursor.step,
            waiting,
            "cursor"
        );

        self.sweep(ctx)?;

        Ok(RenderedContent {
            stage: rendered_at.stage,
            step: rendered_at.step,
            body,
            waiting,
            pending_action: self.next_action(player),
        })
    }

    /// Action expected by the entry `player` will see next, if the
    /// player is not held on a wait.
    #[must_use]
    pub fn next_action(&self, player: &str) -> Option<ActionKind> {
        let cursor = self.state.progress.get(player)?;
        let view = View::new(self, player);
        let entry = self
            .packs
            .entries(cursor.stage)
            .iter()
            .skip(cursor.step)
            .find(|e| e.applies(&view))?;
        if entry.is_waiting(&self.state) {
            None
        } else {
            entry.action
        }
    }

    fn all_caught_up(&self) -> bool {
        let stage = self.state.stage;
        let last = self.packs.last_step(stage);
        self.state
            .progress
            .values()
            .all(|p| p.stage == stage && p.step == last)
    }

    /// Runs the automated players for the current stage and, once every
    /// tracked cursor rests on the stage's last entry and the stage's work
    /// is done, applies one stage transition.
    ///
    /// Returns `true` if the stage moved or the game finished.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Protocol` if the state is inconsistent.
    pub fn sweep(&mut self, ctx: &mut TurnContext<'_>) -> Result<bool, DomainError> {
        if self.state.end_game {
            return Ok(false);
        }
        self.run_stage_handler(ctx)?;
        if !self.all_caught_up() || !stage::is_settled(&self.state) {
            return Ok(false);
        }

        let from = self.state.stage;
        match stage::next_transition(&self.state) {
            Transition::Finish => {
                self.finish(ctx);
                return Ok(true);
            }
            Transition::NextRound => {
                self.state.advance_round(&self.roster, &self.schedule)?;
                self.state.stage = stage::opening_stage(&self.state);
            }
            Transition::Advance(to) => self.state.stage = to,
        }

        info!(
            game_id = %self.id,
            %from,
            to = %self.state.stage,
            quest = self.state.quest,
            round = self.state.round,
            "stage advanced"
        );
        self.record_event(
            SessionEventKind::StageAdvanced(StageAdvanced {
                from,
                to: self.state.stage,
                quest: self.state.quest,
                round: self.state.round,
            }),
            ctx,
        );
        self.run_stage_handler(ctx)?;
        Ok(true)
    }

    fn finish(&mut self, ctx: &TurnContext<'_>) {
        self.state.end_game = true;
        let winner = self.state.winner();
        info!(game_id = %self.id, winner = ?winner, "game ended");
        self.record_event(
            SessionEventKind::GameEnded(GameEnded {
                winner,
                quest_results: self.state.quest_results.clone(),
            }),
            ctx,
        );
    }

    /// Tears the game down. Further pulls keep serving the current entry
    /// but nothing moves any more.
    pub fn abort(&mut self, ctx: &TurnContext<'_>) {
        if !self.state.end_game {
            self.finish(ctx);
        }
    }

    pub(crate) fn record_event(&mut self, kind: SessionEventKind, ctx: &TurnContext<'_>) {
        let pending = i64::try_from(self.uncommitted_events.len()).unwrap_or(i64::MAX);
        let event = SessionEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                aggregate_id: self.id,
                sequence_number: self.version + pending + 1,
                correlation_id: ctx.correlation_id,
                occurred_at: ctx.clock.now(),
            },
            kind,
        };
        self.uncommitted_events.push(event);
    }
}

impl AggregateRoot for Game {
    type Event = SessionEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        let handed_off = i64::try_from(self.uncommitted_events.len()).unwrap_or(i64::MAX);
        self.version += handed_off;
        self.uncommitted_events.clear();
    }
}
