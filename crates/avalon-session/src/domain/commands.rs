//! Commands and player action payloads for the Session & Progress context.

use std::fmt;

use avalon_core::command::Command;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::GameConfig;
use super::state::{QuestCard, VoteCard};

/// A player's answer to the entry in front of them. Each variant carries
/// exactly the fields its action needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerAction {
    /// The leader names the quest team.
    ProposeQuest { members: Vec<String> },
    /// Approve or reject the current team.
    VoteQuest { vote: VoteCard },
    /// Play a quest card. Good members may omit it; they always succeed.
    DoQuest { attempt: Option<QuestCard> },
    /// The assassin names Merlin.
    Assassinate { target: String },
    /// The lady of the lake looks at `target`, or passes with `None`.
    UseLakeLadyPower { target: Option<String> },
}

impl PlayerAction {
    /// Which kind of action this payload is.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::ProposeQuest { .. } => ActionKind::ProposeQuest,
            Self::VoteQuest { .. } => ActionKind::VoteQuest,
            Self::DoQuest { .. } => ActionKind::DoQuest,
            Self::Assassinate { .. } => ActionKind::Assassinate,
            Self::UseLakeLadyPower { .. } => ActionKind::UseLakeLadyPower,
        }
    }
}

/// Action kinds a content entry can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ProposeQuest,
    VoteQuest,
    DoQuest,
    Assassinate,
    UseLakeLadyPower,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ProposeQuest => "propose_quest",
            Self::VoteQuest => "vote_quest",
            Self::DoQuest => "do_quest",
            Self::Assassinate => "assassinate",
            Self::UseLakeLadyPower => "use_lake_lady_power",
        })
    }
}

/// Command to deal a new game.
#[derive(Debug, Clone)]
pub struct CreateGame {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Table settings.
    pub config: GameConfig,
}

impl Command for CreateGame {
    fn command_type(&self) -> &'static str {
        "session.create_game"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command for a player to pull their next piece of content, optionally
/// answering the entry in front of them.
#[derive(Debug, Clone)]
pub struct PullContent {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The game identifier.
    pub game_id: Uuid,
    /// The pulling player.
    pub player: String,
    /// Answer to an action entry, if any.
    pub action: Option<PlayerAction>,
}

impl Command for PullContent {
    fn command_type(&self) -> &'static str {
        "session.pull_content"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to run the stage sweeper without a player pull.
#[derive(Debug, Clone)]
pub struct SweepStage {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The game identifier.
    pub game_id: Uuid,
}

impl Command for SweepStage {
    fn command_type(&self) -> &'static str {
        "session.sweep_stage"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to tear a game down.
#[derive(Debug, Clone)]
pub struct EndGame {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The game identifier.
    pub game_id: Uuid,
}

impl Command for EndGame {
    fn command_type(&self) -> &'static str {
        "session.end_game"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_action_json_shape() {
        let action: PlayerAction =
            serde_json::from_str(r#"{"kind":"vote_quest","vote":"approve"}"#).unwrap();
        assert_eq!(action, PlayerAction::VoteQuest { vote: VoteCard::Approve });
        assert_eq!(action.kind(), ActionKind::VoteQuest);

        let pass: PlayerAction =
            serde_json::from_str(r#"{"kind":"use_lake_lady_power","target":null}"#).unwrap();
        assert_eq!(pass, PlayerAction::UseLakeLadyPower { target: None });
    }

    #[test]
    fn test_command_types() {
        let pull = PullContent {
            correlation_id: Uuid::nil(),
            game_id: Uuid::nil(),
            player: "ann".to_owned(),
            action: None,
        };
        assert_eq!(pull.command_type(), "session.pull_content");
        assert_eq!(ActionKind::UseLakeLadyPower.to_string(), "use_lake_lady_power");
    }
}
