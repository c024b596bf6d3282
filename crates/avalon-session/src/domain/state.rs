//! The shared, authoritative state of one game.

use std::collections::BTreeMap;
use std::fmt;

use avalon_core::error::DomainError;
use serde::{Deserialize, Serialize};

use super::roles::{Roster, Side};
use super::schedule::QuestSchedule;
use super::stage::Stage;

/// Voting rounds per quest; the last one is approved without a vote.
pub const MAX_ROUNDS: usize = 5;

/// Quest wins a side needs to end the game.
pub const WINNING_QUESTS: usize = 3;

/// A vote on the leader's proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteCard {
    Approve,
    Reject,
}

impl fmt::Display for VoteCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        })
    }
}

/// A card played by a quest member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestCard {
    Success,
    Fail,
}

impl fmt::Display for QuestCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Fail => "fail",
        })
    }
}

/// Outcome of a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteResult {
    Approved,
    Rejected,
}

impl fmt::Display for VoteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        })
    }
}

/// Outcome of a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestResult {
    Success,
    Fail,
}

impl QuestResult {
    /// Side credited with the quest.
    #[must_use]
    pub const fn winner(self) -> Side {
        match self {
            Self::Success => Side::Good,
            Self::Fail => Side::Evil,
        }
    }
}

impl fmt::Display for QuestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Fail => "fail",
        })
    }
}

/// The leader's team for the current round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub members: Vec<String>,
    pub done: bool,
}

/// Votes for the current round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRound {
    pub votes: BTreeMap<String, VoteCard>,
    /// Players who have not voted yet, in seat order.
    pub pending: Vec<String>,
    pub done: bool,
    pub n_approve: Option<usize>,
    pub result: Option<VoteResult>,
}

/// Quest cards for the current round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestAttempt {
    pub attempts: BTreeMap<String, QuestCard>,
    /// Members who have not played a card yet.
    pub pending: Vec<String>,
    pub done: bool,
    pub n_fail: Option<usize>,
    pub result: Option<QuestResult>,
}

/// The assassin's last chance after good wins three quests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assassination {
    pub target: Option<String>,
    pub success: Option<bool>,
}

/// Lady of the lake bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LakeLady {
    /// Current holder of the power.
    pub holder: String,
    /// Player chosen this quest; becomes the next holder.
    pub target: Option<String>,
    /// Players never chosen and never holding the power.
    pub pool: Vec<String>,
    /// Whether the power was used or declined this quest.
    pub done: bool,
    /// Most recent player whose side was revealed.
    pub last_revealed: Option<String>,
}

/// A tracked player's position in the content lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub stage: Stage,
    pub step: usize,
}

impl Progress {
    /// Cursor at the first entry of `stage`.
    #[must_use]
    pub const fn start_of(stage: Stage) -> Self {
        Self { stage, step: 0 }
    }
}

/// Single source of truth for a running game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub quest: usize,
    pub round: usize,
    pub stage: Stage,
    pub n_members: usize,
    pub leader: String,
    pub proposal: Proposal,
    pub vote: VoteRound,
    pub attempt: QuestAttempt,
    pub quest_results: Vec<QuestResult>,
    pub win_3_quests: Option<Side>,
    pub assassination: Assassination,
    pub lake_lady: Option<LakeLady>,
    /// Cursors of the human players.
    pub progress: BTreeMap<String, Progress>,
    pub end_game: bool,
}

impl GameState {
    /// Opening state: quest 1, round 1, seat 0 leads and the last seat
    /// holds the lady of the lake.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Config` for an empty roster.
    pub fn new(
        roster: &Roster,
        schedule: &QuestSchedule,
        has_lake_lady: bool,
    ) -> Result<Self, DomainError> {
        let (first, last) = match roster.players() {
            [first, .., last] => (first, last),
            _ => return Err(DomainError::Config("a game needs at least two seats".to_owned())),
        };

        let lake_lady = has_lake_lady.then(|| LakeLady {
            holder: last.name.clone(),
            target: None,
            pool: roster
                .names()
                .into_iter()
                .filter(|name| *name != last.name)
                .collect(),
            done: false,
            last_revealed: None,
        });

        let progress = roster
            .human_names()
            .into_iter()
            .map(|name| (name, Progress::start_of(Stage::Init)))
            .collect();

        Ok(Self {
            quest: 1,
            round: 1,
            stage: Stage::Init,
            n_members: schedule.members[0],
            leader: first.name.clone(),
            proposal: Proposal::default(),
            vote: VoteRound::default(),
            attempt: QuestAttempt::default(),
            quest_results: Vec::new(),
            win_3_quests: None,
            assassination: Assassination::default(),
            lake_lady,
            progress,
            end_game: false,
        })
    }

    /// Starts the next voting round.
    ///
    /// A round without a quest result stays on the same quest. Otherwise
    /// the next quest begins at round 1 and the lady of the lake passes to
    /// her chosen target. Either way the leadership moves one seat on and
    /// every round field is cleared.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Protocol` if the leader is not seated or the
    /// schedule has no further quest.
    pub fn advance_round(
        &mut self,
        roster: &Roster,
        schedule: &QuestSchedule,
    ) -> Result<(), DomainError> {
        if self.attempt.result.is_none() {
            self.round += 1;
        } else {
            self.quest += 1;
            self.round = 1;
            self.n_members = schedule.required(self.quest).ok_or_else(|| {
                DomainError::Protocol(format!("no quest {} in the schedule", self.quest))
            })?;
            if let Some(lake_lady) = self.lake_lady.as_mut() {
                if let Some(target) = lake_lady.target.take() {
                    lake_lady.holder = target;
                }
                lake_lady.done = false;
            }
        }

        self.leader = roster
            .next_after(&self.leader)
            .map(|p| p.name.clone())
            .ok_or_else(|| {
                DomainError::Protocol(format!("leader {} is not seated", self.leader))
            })?;

        self.proposal = Proposal::default();
        self.vote = VoteRound::default();
        self.attempt = QuestAttempt::default();
        Ok(())
    }

    /// Quests won by `side` so far.
    #[must_use]
    pub fn wins_for(&self, side: Side) -> usize {
        self.quest_results
            .iter()
            .filter(|r| r.winner() == side)
            .count()
    }

    /// Side that has won more than two quests, if any.
    #[must_use]
    pub fn quest_winner(&self) -> Option<Side> {
        [Side::Good, Side::Evil]
            .into_iter()
            .find(|side| self.wins_for(*side) >= WINNING_QUESTS)
    }

    /// Final winner, once it is decided.
    ///
    /// Evil wins outright on three failed quests. After three successes
    /// the assassin's pick decides: hitting Merlin hands the game to evil.
    #[must_use]
    pub fn winner(&self) -> Option<Side> {
        match self.win_3_quests? {
            Side::Evil => Some(Side::Evil),
            Side::Good => {
                if self.assassination.success? {
                    Some(Side::Evil)
                } else {
                    Some(Side::Good)
                }
            }
        }
    }

    /// Whether this is the last voting round, approved without a vote.
    #[must_use]
    pub fn is_forced_round(&self) -> bool {
        self.round >= MAX_ROUNDS
    }

    /// Whether `name` is on the current team.
    #[must_use]
    pub fn is_member(&self, name: &str) -> bool {
        self.proposal.members.iter().any(|m| m == name)
    }

    /// Current lady of the lake, if the mechanic is enabled.
    #[must_use]
    pub fn lake_lady_holder(&self) -> Option<&str> {
        self.lake_lady.as_ref().map(|l| l.holder.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::GameConfig;
    use crate::domain::roles::assign_roles;
    use avalon_test_support::MockRng;

    fn setup(n: usize, lake_lady: bool) -> (Roster, QuestSchedule, GameState) {
        let config = GameConfig::new((1..=n).map(|i| format!("p{i}")));
        let roster = assign_roles(&config, &[], &mut MockRng);
        let schedule = QuestSchedule::for_players(n).unwrap();
        let state = GameState::new(&roster, &schedule, lake_lady).unwrap();
        (roster, schedule, state)
    }

    #[test]
    fn test_new_state_starts_at_quest_one_with_first_seat_leading() {
        let (roster, _, state) = setup(5, true);
        let names = roster.names();
        assert_eq!((state.quest, state.round, state.stage), (1, 1, Stage::Init));
        assert_eq!(state.n_members, 2);
        assert_eq!(state.leader, names[0]);
        let lake = state.lake_lady.as_ref().unwrap();
        assert_eq!(lake.holder, names[4]);
        assert_eq!(lake.pool.len(), 4);
        assert!(!lake.pool.contains(&names[4]));
        assert_eq!(state.progress.len(), 5);
    }

    #[test]
    fn test_new_state_without_lake_lady() {
        let (_, _, state) = setup(6, false);
        assert!(state.lake_lady.is_none());
        assert!(state.lake_lady_holder().is_none());
    }

    #[test]
    fn test_advance_round_after_rejection_keeps_quest() {
        let (roster, schedule, mut state) = setup(5, false);
        let names = roster.names();
        state.proposal.members = vec![names[0].clone(), names[1].clone()];
        state.vote.result = Some(VoteResult::Rejected);

        state.advance_round(&roster, &schedule).unwrap();

        assert_eq!((state.quest, state.round), (1, 2));
        assert_eq!(state.leader, names[1]);
        assert!(state.proposal.members.is_empty());
        assert!(state.vote.result.is_none());
    }

    #[test]
    fn test_advance_round_after_quest_moves_to_next_quest() {
        let (roster, schedule, mut state) = setup(6, true);
        let names = roster.names();
        state.round = 3;
        state.leader = names[5].clone();
        state.attempt.result = Some(QuestResult::Success);
        state.quest_results.push(QuestResult::Success);
        {
            let lake = state.lake_lady.as_mut().unwrap();
            lake.target = Some(names[2].clone());
            lake.done = true;
        }

        state.advance_round(&roster, &schedule).unwrap();

        assert_eq!((state.quest, state.round), (2, 1));
        assert_eq!(state.n_members, 3);
        assert_eq!(state.leader, names[0], "leadership wraps to the first seat");
        let lake = state.lake_lady.as_ref().unwrap();
        assert_eq!(lake.holder, names[2]);
        assert!(lake.target.is_none());
        assert!(!lake.done);
        assert_eq!(state.quest_results, vec![QuestResult::Success]);
    }

    #[test]
    fn test_declined_lake_lady_keeps_holder_on_next_quest() {
        let (roster, schedule, mut state) = setup(5, true);
        let holder = state.lake_lady_holder().unwrap().to_owned();
        state.lake_lady.as_mut().unwrap().done = true;
        state.attempt.result = Some(QuestResult::Fail);

        state.advance_round(&roster, &schedule).unwrap();

        assert_eq!(state.lake_lady_holder(), Some(holder.as_str()));
        assert!(!state.lake_lady.as_ref().unwrap().done);
    }

    #[test]
    fn test_quest_winner_needs_three_results() {
        let (_, _, mut state) = setup(5, false);
        state.quest_results = vec![QuestResult::Success, QuestResult::Fail, QuestResult::Success];
        assert_eq!(state.quest_winner(), None);
        state.quest_results.push(QuestResult::Success);
        assert_eq!(state.quest_winner(), Some(Side::Good));
    }

    #[test]
    fn test_winner_depends_on_assassination_after_good_wins() {
        let (_, _, mut state) = setup(5, false);
        assert_eq!(state.winner(), None);

        state.win_3_quests = Some(Side::Good);
        assert_eq!(state.winner(), None, "undecided until the assassin picks");

        state.assassination.success = Some(false);
        assert_eq!(state.winner(), Some(Side::Good));

        state.assassination.success = Some(true);
        assert_eq!(state.winner(), Some(Side::Evil));
    }

    #[test]
    fn test_evil_wins_outright_on_three_fails() {
        let (_, _, mut state) = setup(5, false);
        state.win_3_quests = Some(Side::Evil);
        assert_eq!(state.winner(), Some(Side::Evil));
    }
}
