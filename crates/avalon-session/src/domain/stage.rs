//! The stage machine.
//!
//! Transitions are pure functions of [`GameState`]; the aggregate decides
//! when to evaluate them (every tracked cursor parked on the last entry of
//! the current stage) and applies the result.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::roles::Side;
use super::state::{GameState, VoteResult};

/// First quest on which the lady of the lake may be used.
pub const LAKE_LADY_FIRST_QUEST: usize = 3;

/// Stages of a game, in play order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    LakeLady,
    Proposal,
    Vote,
    Quest,
    Record,
    End,
}

impl Stage {
    /// Every stage in play order.
    pub const ALL: [Self; 7] = [
        Self::Init,
        Self::LakeLady,
        Self::Proposal,
        Self::Vote,
        Self::Quest,
        Self::Record,
        Self::End,
    ];

    /// Wire name of the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::LakeLady => "lake_lady",
            Self::Proposal => "proposal",
            Self::Vote => "vote",
            Self::Quest => "quest",
            Self::Record => "record",
            Self::End => "end",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the machine does once everybody has caught up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Start the next voting round, possibly on the next quest.
    NextRound,
    /// Move to another stage without touching the round.
    Advance(Stage),
    /// Past the final stage: the game is over.
    Finish,
}

/// Picks the transition out of the current stage.
#[must_use]
pub fn next_transition(state: &GameState) -> Transition {
    let rejected = state.vote.result == Some(VoteResult::Rejected);
    match state.stage {
        Stage::Record if rejected || state.win_3_quests.is_none() => Transition::NextRound,
        Stage::Record => Transition::Advance(Stage::End),
        Stage::Vote if rejected => Transition::Advance(Stage::Record),
        Stage::Vote => Transition::Advance(Stage::Quest),
        Stage::Proposal if state.is_forced_round() => Transition::Advance(Stage::Quest),
        Stage::Proposal => Transition::Advance(Stage::Vote),
        Stage::Init | Stage::LakeLady => Transition::Advance(Stage::Proposal),
        Stage::Quest => Transition::Advance(Stage::Record),
        Stage::End => Transition::Finish,
    }
}

/// Stage that opens a freshly started round: the lady of the lake first
/// when she is due on this quest, otherwise the proposal.
#[must_use]
pub fn opening_stage(state: &GameState) -> Stage {
    match &state.lake_lady {
        Some(lake) if state.quest >= LAKE_LADY_FIRST_QUEST && !lake.done => Stage::LakeLady,
        _ => Stage::Proposal,
    }
}

/// Whether the shared work of the current stage is finished, so the
/// machine may leave it.
#[must_use]
pub fn is_settled(state: &GameState) -> bool {
    match state.stage {
        Stage::Init | Stage::Record => true,
        Stage::LakeLady => state.lake_lady.as_ref().is_none_or(|l| l.done),
        Stage::Proposal => state.proposal.done,
        Stage::Vote => state.vote.done,
        Stage::Quest => state.attempt.done,
        Stage::End => {
            state.win_3_quests != Some(Side::Good) || state.assassination.success.is_some()
        }
    }
}
