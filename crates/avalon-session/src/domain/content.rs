//! Per-stage content lists ("message packs") and the pieces they are
//! built from.
//!
//! Every entry is a typed descriptor: literal text with an explicit
//! parameter list, a computed text, or a table, plus an optional guard, an
//! optional wait key and an optional bound action. Nothing is evaluated
//! from strings at runtime.

use std::collections::BTreeMap;

use avalon_core::error::DomainError;

use super::aggregates::Game;
use super::commands::ActionKind;
use super::render::{self, Param, TextTable};
use super::roles::{Character, Roster, Side};
use super::stage::Stage;
use super::state::GameState;

/// A game seen through one player's eyes.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    pub game: &'a Game,
    pub viewer: &'a str,
}

impl<'a> View<'a> {
    /// Creates a view of `game` for `viewer`.
    #[must_use]
    pub const fn new(game: &'a Game, viewer: &'a str) -> Self {
        Self { game, viewer }
    }

    #[must_use]
    pub fn state(&self) -> &'a GameState {
        self.game.state()
    }

    #[must_use]
    pub fn roster(&self) -> &'a Roster {
        self.game.roster()
    }

    #[must_use]
    pub fn is_leader(&self) -> bool {
        self.state().leader == self.viewer
    }

    #[must_use]
    pub fn is_member(&self) -> bool {
        self.state().is_member(self.viewer)
    }

    #[must_use]
    pub fn side(&self) -> Option<Side> {
        self.roster().side_of(self.viewer)
    }

    #[must_use]
    pub fn holds_lake_lady(&self) -> bool {
        self.state().lake_lady_holder() == Some(self.viewer)
    }

    #[must_use]
    pub fn is_assassin(&self) -> bool {
        self.roster()
            .holder_of(Character::Assassin)
            .is_some_and(|p| p.name == self.viewer)
    }
}

/// Predicate deciding whether an entry applies to a viewer right now.
pub type Guard = fn(&View<'_>) -> bool;

/// What an entry shows.
#[derive(Debug, Clone, Copy)]
pub enum Content {
    /// Text with `{}` placeholders filled from `params` in order.
    Template {
        text: &'static str,
        params: &'static [Param],
    },
    /// Text produced by a function of the view.
    Computed(fn(&View<'_>) -> Result<String, DomainError>),
    /// A table produced by a function of the view.
    Table(fn(&View<'_>) -> Result<TextTable, DomainError>),
    /// Nothing to show; the entry only takes an action.
    Silent,
}

/// Shared-state flags a player can be held on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKey {
    LakeLadyDone,
    ProposalDone,
    VoteDone,
    QuestDone,
    AssassinTargetChosen,
}

impl WaitKey {
    /// Whether the flag is set in `state`.
    #[must_use]
    pub fn is_met(self, state: &GameState) -> bool {
        match self {
            Self::LakeLadyDone => state.lake_lady.as_ref().is_none_or(|l| l.done),
            Self::ProposalDone => state.proposal.done,
            Self::VoteDone => state.vote.done,
            Self::QuestDone => state.attempt.done,
            Self::AssassinTargetChosen => state.assassination.target.is_some(),
        }
    }
}

/// One step of a stage's content list.
#[derive(Debug, Clone, Copy)]
pub struct ContentEntry {
    pub content: Content,
    pub guard: Option<Guard>,
    pub wait: Option<WaitKey>,
    pub action: Option<ActionKind>,
}

impl ContentEntry {
    fn new(content: Content) -> Self {
        Self {
            content,
            guard: None,
            wait: None,
            action: None,
        }
    }

    /// Literal text with parameters.
    #[must_use]
    pub fn template(text: &'static str, params: &'static [Param]) -> Self {
        Self::new(Content::Template { text, params })
    }

    /// Literal text without parameters.
    #[must_use]
    pub fn text(text: &'static str) -> Self {
        Self::template(text, &[])
    }

    /// Text computed from the view.
    #[must_use]
    pub fn computed(f: fn(&View<'_>) -> Result<String, DomainError>) -> Self {
        Self::new(Content::Computed(f))
    }

    /// Table computed from the view.
    #[must_use]
    pub fn table(f: fn(&View<'_>) -> Result<TextTable, DomainError>) -> Self {
        Self::new(Content::Table(f))
    }

    /// An entry that shows nothing and takes `kind`.
    #[must_use]
    pub fn silent(kind: ActionKind) -> Self {
        Self::new(Content::Silent).binds(kind)
    }

    /// Shows the entry only when `guard` holds.
    #[must_use]
    pub fn when(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Holds the viewer on this entry until `key` is met.
    #[must_use]
    pub fn wait_for(mut self, key: WaitKey) -> Self {
        self.wait = Some(key);
        self
    }

    /// Makes the entry take an action of `kind`.
    #[must_use]
    pub fn binds(mut self, kind: ActionKind) -> Self {
        self.action = Some(kind);
        self
    }

    /// Whether the entry applies to `view`.
    #[must_use]
    pub fn applies(&self, view: &View<'_>) -> bool {
        self.guard.is_none_or(|guard| guard(view))
    }

    /// Whether the viewer must stay on this entry.
    #[must_use]
    pub fn is_waiting(&self, state: &GameState) -> bool {
        self.wait.is_some_and(|key| !key.is_met(state))
    }
}

/// The content lists of every stage, built once per game.
#[derive(Debug, Clone)]
pub struct MessagePacks {
    stages: BTreeMap<Stage, Vec<ContentEntry>>,
}

impl MessagePacks {
    /// Builds all lists. The lake lady list is empty when the mechanic is off.
    #[must_use]
    pub fn build(has_lake_lady: bool) -> Self {
        let mut stages = BTreeMap::new();
        stages.insert(Stage::Init, init_pack());
        stages.insert(
            Stage::LakeLady,
            if has_lake_lady { lake_lady_pack() } else { Vec::new() },
        );
        stages.insert(Stage::Proposal, proposal_pack());
        stages.insert(Stage::Vote, vote_pack());
        stages.insert(Stage::Quest, quest_pack());
        stages.insert(Stage::Record, record_pack());
        stages.insert(Stage::End, end_pack());
        Self { stages }
    }

    /// Entries of `stage`.
    #[must_use]
    pub fn entries(&self, stage: Stage) -> &[ContentEntry] {
        self.stages.get(&stage).map_or(&[], Vec::as_slice)
    }

    /// Index of the final entry of `stage`.
    #[must_use]
    pub fn last_step(&self, stage: Stage) -> usize {
        self.entries(stage).len().saturating_sub(1)
    }
}

const WAIT_INIT: &str = "Please wait for the other players to complete the init stage.";
const WAIT_LAKE_LADY: &str = "Please wait for the other players to complete the lake lady stage.";
const WAIT_PROPOSAL: &str = "Please wait for the other players to complete the proposal stage.";
const WAIT_VOTE: &str = "Please wait for the other players to complete the vote stage.";
const WAIT_QUEST: &str = "Please wait for the other players to complete the quest stage.";
const WAIT_RECORD: &str = "Please wait for the other players to complete the record stage.";

fn init_pack() -> Vec<ContentEntry> {
    vec![
        ContentEntry::template("Hi {}, welcome to Avalon.", &[Param::Nickname]),
        ContentEntry::computed(|v| Ok(render::game_info_summary(v.game))),
        ContentEntry::table(|v| render::player_info_view(v.game, v.viewer)),
        ContentEntry::text(WAIT_INIT),
    ]
}

fn lake_lady_done(v: &View<'_>) -> bool {
    v.state().lake_lady.as_ref().is_some_and(|l| l.done)
}

fn lake_lady_has_target(v: &View<'_>) -> bool {
    v.state()
        .lake_lady
        .as_ref()
        .is_some_and(|l| l.target.is_some())
}

fn lake_lady_pack() -> Vec<ContentEntry> {
    vec![
        ContentEntry::text("You are the lady of the lake.").when(|v| v.holds_lake_lady()),
        ContentEntry::template("{} is the lady of the lake.", &[Param::LakeLady])
            .when(|v| !v.holds_lake_lady()),
        ContentEntry::template(
            "Please select a player to reveal, or pass this quest. Candidates: {}",
            &[Param::LakeLadyPool],
        )
        .when(|v| v.holds_lake_lady()),
        ContentEntry::template(
            "Please wait while the lady of the lake {} decides whether to use her power.",
            &[Param::LakeLady],
        )
        .when(|v| !v.holds_lake_lady() && !lake_lady_done(v))
        .wait_for(WaitKey::LakeLadyDone),
        ContentEntry::silent(ActionKind::UseLakeLadyPower).when(|v| v.holds_lake_lady()),
        ContentEntry::template(
            "You have selected {} and they are on the {} side.",
            &[Param::LakeLadyTarget, Param::LakeLadyTargetSide],
        )
        .when(|v| v.holds_lake_lady() && lake_lady_done(v) && lake_lady_has_target(v)),
        ContentEntry::text("You have decided not to use your power this round.")
            .when(|v| v.holds_lake_lady() && lake_lady_done(v) && !lake_lady_has_target(v)),
        ContentEntry::template(
            "The lady of the lake {} has selected {} and learned their side.",
            &[Param::LakeLady, Param::LakeLadyTarget],
        )
        .when(|v| !v.holds_lake_lady() && lake_lady_done(v) && lake_lady_has_target(v)),
        ContentEntry::template(
            "The lady of the lake {} has decided not to use her power this round.",
            &[Param::LakeLady],
        )
        .when(|v| !v.holds_lake_lady() && lake_lady_done(v) && !lake_lady_has_target(v)),
        ContentEntry::text(WAIT_LAKE_LADY),
    ]
}

fn proposal_pack() -> Vec<ContentEntry> {
    vec![
        ContentEntry::template("Quest {} Round {}", &[Param::Quest, Param::Round]),
        ContentEntry::text(
            "Warning! This is voting round 5. \
             The team the leader proposes goes on the quest without a vote!",
        )
        .when(|v| v.state().is_forced_round()),
        ContentEntry::text("You are the current leader.").when(|v| v.is_leader()),
        ContentEntry::template("{} is the current leader.", &[Param::Leader])
            .when(|v| !v.is_leader()),
        ContentEntry::template(
            "Please select {} members to do quest {}. Candidates: {}",
            &[Param::NMembers, Param::Quest, Param::SeatList],
        )
        .when(|v| v.is_leader()),
        ContentEntry::template(
            "Please wait for leader {} to select members for quest {}.",
            &[Param::Leader, Param::Quest],
        )
        .when(|v| !v.is_leader() && v.state().proposal.members.is_empty())
        .wait_for(WaitKey::ProposalDone),
        ContentEntry::template(
            "You have selected {} to do quest {}.",
            &[Param::Members, Param::Quest],
        )
        .when(|v| v.is_leader())
        .binds(ActionKind::ProposeQuest),
        ContentEntry::template(
            "Leader {} has selected {} to do quest {}.",
            &[Param::Leader, Param::Members, Param::Quest],
        )
        .when(|v| !v.is_leader()),
        ContentEntry::text(WAIT_PROPOSAL),
    ]
}

fn vote_pack() -> Vec<ContentEntry> {
    vec![
        ContentEntry::template(
            "Please vote to approve or reject {} doing quest {}.",
            &[Param::Members, Param::Quest],
        ),
        ContentEntry::template("You have voted {}.", &[Param::OwnVote])
            .binds(ActionKind::VoteQuest),
        ContentEntry::template(
            "Please wait for the other players ({}) to vote.",
            &[Param::PendingVotes],
        )
        .when(|v| !v.state().vote.done)
        .wait_for(WaitKey::VoteDone),
        ContentEntry::table(|v| Ok(render::votes_table(v.game, v.viewer))),
        ContentEntry::template(
            "Total {} approve, the proposal is {}.",
            &[Param::NApprove, Param::VoteResult],
        ),
        ContentEntry::text(WAIT_VOTE),
    ]
}

fn quest_pack() -> Vec<ContentEntry> {
    vec![
        ContentEntry::template("You are selected to do quest {}.", &[Param::Quest])
            .when(|v| v.is_member()),
        ContentEntry::text("You are on the evil side. Please choose success or fail.")
            .when(|v| v.is_member() && v.side() == Some(Side::Evil)),
        ContentEntry::text("You are on the good side. You can only succeed the quest.")
            .when(|v| v.is_member() && v.side() == Some(Side::Good)),
        ContentEntry::template(
            "You played {} on quest {}.",
            &[Param::OwnAttempt, Param::Quest],
        )
        .when(|v| v.is_member())
        .binds(ActionKind::DoQuest),
        ContentEntry::template("{} are now doing quest {}.", &[Param::Members, Param::Quest])
            .when(|v| !v.is_member()),
        ContentEntry::template(
            "Please wait. {} are still doing quest {}.",
            &[Param::PendingAttempts, Param::Quest],
        )
        .when(|v| !v.state().attempt.done)
        .wait_for(WaitKey::QuestDone),
        ContentEntry::template(
            "Total {} fail, the quest result is {}.",
            &[Param::NFail, Param::QuestResult],
        ),
        ContentEntry::text(WAIT_QUEST),
    ]
}

fn record_pack() -> Vec<ContentEntry> {
    vec![
        ContentEntry::table(|v| Ok(render::history_view(v.game, v.viewer, false))),
        ContentEntry::text(WAIT_RECORD),
    ]
}

fn good_won(v: &View<'_>) -> bool {
    v.state().win_3_quests == Some(Side::Good)
}

fn assassin_hit(v: &View<'_>) -> bool {
    v.state().assassination.success == Some(true)
}

fn assassin_missed(v: &View<'_>) -> bool {
    v.state().assassination.success == Some(false)
}

fn end_pack() -> Vec<ContentEntry> {
    vec![
        ContentEntry::template("The {} side has won 3 quests.", &[Param::WinningSide])
            .when(|v| v.state().win_3_quests.is_some()),
        ContentEntry::text(
            "Now the evil side has one last chance: the assassin must identify Merlin!",
        )
        .when(good_won),
        ContentEntry::text("You are the assassin.").when(|v| good_won(v) && v.is_assassin()),
        ContentEntry::template("{} is the assassin.", &[Param::Assassin])
            .when(|v| good_won(v) && !v.is_assassin()),
        ContentEntry::template(
            "Please choose your target. Candidates: {}",
            &[Param::AssassinCandidates],
        )
        .when(|v| good_won(v) && v.is_assassin()),
        ContentEntry::template(
            "Please wait for assassin {} to choose a target.",
            &[Param::Assassin],
        )
        .when(|v| good_won(v) && !v.is_assassin() && v.state().assassination.target.is_none())
        .wait_for(WaitKey::AssassinTargetChosen),
        ContentEntry::template("You have picked {}.", &[Param::AssassinTarget])
            .when(|v| good_won(v) && v.is_assassin())
            .binds(ActionKind::Assassinate),
        ContentEntry::template(
            "Assassin {} has picked {}.",
            &[Param::Assassin, Param::AssassinTarget],
        )
        .when(|v| good_won(v) && !v.is_assassin()),
        ContentEntry::template("And you did it! {} is Merlin! Evil side wins!", &[Param::Merlin])
            .when(|v| v.is_assassin() && assassin_hit(v)),
        ContentEntry::template("And you missed! {} is Merlin! Good side wins!", &[Param::Merlin])
            .when(|v| v.is_assassin() && assassin_missed(v)),
        ContentEntry::template(
            "And assassin {} did it! {} is Merlin! Evil side wins!",
            &[Param::Assassin, Param::Merlin],
        )
        .when(|v| !v.is_assassin() && assassin_hit(v)),
        ContentEntry::template(
            "And assassin {} missed! {} is Merlin! Good side wins!",
            &[Param::Assassin, Param::Merlin],
        )
        .when(|v| !v.is_assassin() && assassin_missed(v)),
        ContentEntry::text("End Game. Thanks for playing."),
    ]
}
