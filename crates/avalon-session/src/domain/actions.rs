//! Player actions and the automated-player stage handlers.
//!
//! Every action validates its actor and input before touching state; a
//! rejected action leaves the game exactly as it was. The stage handlers
//! run inside the sweep: they act for automated players whose move is
//! still outstanding and close the stage's bookkeeping once everyone has
//! acted.

use std::collections::BTreeSet;

use avalon_core::error::DomainError;
use avalon_core::rng::{RngBridge, pick_index};
use rand::seq::IndexedRandom;
use tracing::{debug, info};

use super::aggregates::{Game, TurnContext};
use super::commands::PlayerAction;
use super::events::{
    AssassinationAttempted, LakeLadyUsed, ProposalMade, QuestAttempted, RoundRecorded,
    SessionEventKind, VoteCast,
};
use super::history::RoundRecord;
use super::roles::{Character, Knowledge, Side};
use super::stage::Stage;
use super::state::{QuestCard, QuestResult, VoteCard, VoteResult};

fn rejected(msg: impl Into<String>) -> DomainError {
    DomainError::Validation(msg.into())
}

impl Game {
    /// Dispatches a typed action payload to its handler.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the handler rejects it.
    pub fn apply_action(
        &mut self,
        player: &str,
        action: PlayerAction,
        ctx: &TurnContext<'_>,
    ) -> Result<(), DomainError> {
        match action {
            PlayerAction::ProposeQuest { members } => self.propose_quest(player, members, ctx),
            PlayerAction::VoteQuest { vote } => self.vote_quest(player, vote, ctx),
            PlayerAction::DoQuest { attempt } => self.do_quest(player, attempt, ctx),
            PlayerAction::Assassinate { target } => self.assassinate(player, &target, ctx),
            PlayerAction::UseLakeLadyPower { target } => {
                self.use_lake_lady_power(player, target, ctx)
            }
        }
    }

    /// Whether `action` repeats an answer `player` already gave in the
    /// current stage.
    pub(crate) fn is_resubmission(&self, player: &str, action: &PlayerAction) -> bool {
        let state = &self.state;
        match action {
            PlayerAction::ProposeQuest { .. } => {
                state.stage == Stage::Proposal
                    && state.leader == player
                    && !state.proposal.members.is_empty()
            }
            PlayerAction::VoteQuest { .. } => {
                state.stage == Stage::Vote && state.vote.votes.contains_key(player)
            }
            PlayerAction::DoQuest { .. } => {
                state.stage == Stage::Quest && state.attempt.attempts.contains_key(player)
            }
            PlayerAction::Assassinate { .. } => {
                state.stage == Stage::End && state.assassination.target.is_some()
            }
            PlayerAction::UseLakeLadyPower { .. } => {
                state.stage == Stage::LakeLady
                    && state
                        .lake_lady
                        .as_ref()
                        .is_some_and(|lake| lake.done && lake.holder == player)
            }
        }
    }

    fn ensure_stage(&self, stage: Stage, what: &str) -> Result<(), DomainError> {
        if self.state.stage == stage {
            Ok(())
        } else {
            Err(rejected(format!(
                "cannot {what} during the {} stage",
                self.state.stage
            )))
        }
    }

    /// The leader names the team for the current quest.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside the proposal stage, for
    /// anyone but the leader, or for a team of the wrong size, with unknown
    /// or repeated names. Resubmitting the accepted team is a no-op.
    pub fn propose_quest(
        &mut self,
        leader: &str,
        members: Vec<String>,
        ctx: &TurnContext<'_>,
    ) -> Result<(), DomainError> {
        self.ensure_stage(Stage::Proposal, "propose a team")?;
        if leader != self.state.leader {
            return Err(rejected(format!("{leader} is not the current leader")));
        }
        if !self.state.proposal.members.is_empty() {
            return if self.state.proposal.members == members {
                Ok(())
            } else {
                Err(rejected("the team for this round is already set"))
            };
        }
        if members.len() != self.state.n_members {
            return Err(rejected(format!(
                "quest {} needs {} members, got {}",
                self.state.quest,
                self.state.n_members,
                members.len()
            )));
        }
        let mut seen = BTreeSet::new();
        for member in &members {
            if !self.roster.contains(member) {
                return Err(rejected(format!("{member} is not at this table")));
            }
            if !seen.insert(member.as_str()) {
                return Err(rejected(format!("{member} was selected twice")));
            }
        }

        debug!(game_id = %self.id, leader, ?members, "team proposed");
        self.state.proposal.members.clone_from(&members);
        self.record_event(
            SessionEventKind::ProposalMade(ProposalMade {
                quest: self.state.quest,
                round: self.state.round,
                leader: leader.to_owned(),
                members,
            }),
            ctx,
        );
        Ok(())
    }

    /// Records a vote. Voting again while the vote is open overwrites the
    /// earlier vote.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside the vote stage, for unknown
    /// players, or for a changed vote after the vote closed.
    pub fn vote_quest(
        &mut self,
        player: &str,
        vote: VoteCard,
        ctx: &TurnContext<'_>,
    ) -> Result<(), DomainError> {
        self.ensure_stage(Stage::Vote, "vote")?;
        if !self.roster.contains(player) {
            return Err(rejected(format!("{player} is not at this table")));
        }
        if self.state.vote.done {
            return match self.state.vote.votes.get(player) {
                Some(previous) if *previous == vote => Ok(()),
                _ => Err(rejected("voting for this round has closed")),
            };
        }

        self.state.vote.votes.insert(player.to_owned(), vote);
        self.state.vote.pending.retain(|p| p != player);
        self.record_event(
            SessionEventKind::VoteCast(VoteCast {
                quest: self.state.quest,
                round: self.state.round,
                player: player.to_owned(),
                vote,
            }),
            ctx,
        );
        Ok(())
    }

    /// Plays a quest card. Good members always play success, whatever
    /// they send; evil members must choose.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside the quest stage, for
    /// players not on the team, for an evil member without a card, or for a
    /// changed card after the quest resolved.
    pub fn do_quest(
        &mut self,
        player: &str,
        attempt: Option<QuestCard>,
        ctx: &TurnContext<'_>,
    ) -> Result<(), DomainError> {
        self.ensure_stage(Stage::Quest, "play a quest card")?;
        if !self.state.is_member(player) {
            return Err(rejected(format!("{player} is not on the quest team")));
        }
        let card = match self.roster.side_of(player) {
            Some(Side::Good) => QuestCard::Success,
            Some(Side::Evil) => {
                attempt.ok_or_else(|| rejected("evil members must choose success or fail"))?
            }
            None => return Err(rejected(format!("{player} is not at this table"))),
        };
        if self.state.attempt.done {
            return match self.state.attempt.attempts.get(player) {
                Some(previous) if *previous == card => Ok(()),
                _ => Err(rejected("the quest has already been resolved")),
            };
        }

        self.state.attempt.attempts.insert(player.to_owned(), card);
        self.state.attempt.pending.retain(|p| p != player);
        self.record_event(
            SessionEventKind::QuestAttempted(QuestAttempted {
                quest: self.state.quest,
                player: player.to_owned(),
                attempt: card,
            }),
            ctx,
        );
        Ok(())
    }

    /// The assassin names a target after good has won three quests.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside that window, for anyone
    /// but the assassin, for an unknown target or the assassin themself,
    /// or for a different target once one was named.
    pub fn assassinate(
        &mut self,
        assassin: &str,
        target: &str,
        ctx: &TurnContext<'_>,
    ) -> Result<(), DomainError> {
        self.ensure_stage(Stage::End, "assassinate")?;
        if self.state.win_3_quests != Some(Side::Good) {
            return Err(rejected(
                "the assassin only strikes after good wins three quests",
            ));
        }
        let holder = self
            .roster
            .holder_of(Character::Assassin)
            .map(|p| p.name.clone())
            .ok_or_else(|| DomainError::Protocol("no assassin was dealt".to_owned()))?;
        if assassin != holder {
            return Err(rejected(format!("{assassin} is not the assassin")));
        }
        if let Some(previous) = &self.state.assassination.target {
            return if previous == target {
                Ok(())
            } else {
                Err(rejected("the assassin has already picked a target"))
            };
        }
        if !self.roster.contains(target) {
            return Err(rejected(format!("{target} is not at this table")));
        }
        if target == assassin {
            return Err(rejected("the assassin cannot target themself"));
        }

        let success = self
            .roster
            .holder_of(Character::Merlin)
            .is_some_and(|merlin| merlin.name == target);
        self.state.assassination.target = Some(target.to_owned());
        self.state.assassination.success = Some(success);
        info!(game_id = %self.id, assassin, target, success, "assassination");
        self.record_event(
            SessionEventKind::AssassinationAttempted(AssassinationAttempted {
                assassin: assassin.to_owned(),
                target: target.to_owned(),
                success,
            }),
            ctx,
        );
        Ok(())
    }

    /// The lady of the lake learns `target`'s true side, or passes with
    /// `None` and keeps the power for a later quest.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside the lake lady stage, for
    /// anyone but the holder, for a target outside the pool, or for a
    /// different choice once one was made.
    pub fn use_lake_lady_power(
        &mut self,
        holder: &str,
        target: Option<String>,
        ctx: &TurnContext<'_>,
    ) -> Result<(), DomainError> {
        self.ensure_stage(Stage::LakeLady, "use the lady of the lake")?;
        let lake = self
            .state
            .lake_lady
            .as_ref()
            .ok_or_else(|| rejected("the lady of the lake is not in this game"))?;
        if lake.holder != holder {
            return Err(rejected(format!("{holder} is not the lady of the lake")));
        }
        if lake.done {
            return if lake.target == target {
                Ok(())
            } else {
                Err(rejected("the lady of the lake has already chosen this quest"))
            };
        }

        if let Some(chosen) = &target {
            if !lake.pool.contains(chosen) {
                return Err(rejected(format!(
                    "{chosen} cannot be chosen by the lady of the lake"
                )));
            }
            let side = self
                .roster
                .side_of(chosen)
                .ok_or_else(|| rejected(format!("{chosen} is not at this table")))?;
            if let Some(player) = self.roster.get_mut(holder) {
                player.knowledge.insert(chosen.clone(), Knowledge::from(side));
            }
        }

        let quest = self.state.quest;
        if let Some(lake) = self.state.lake_lady.as_mut() {
            if let Some(chosen) = &target {
                lake.pool.retain(|p| p != chosen);
                lake.last_revealed = Some(chosen.clone());
            }
            lake.target.clone_from(&target);
            lake.done = true;
        }
        debug!(game_id = %self.id, holder, ?target, "lady of the lake used");
        self.record_event(
            SessionEventKind::LakeLadyUsed(LakeLadyUsed {
                quest,
                holder: holder.to_owned(),
                target,
            }),
            ctx,
        );
        Ok(())
    }

    /// Acts for automated players in the current stage and closes the
    /// stage's bookkeeping when every action is in.
    pub(crate) fn run_stage_handler(
        &mut self,
        ctx: &mut TurnContext<'_>,
    ) -> Result<(), DomainError> {
        match self.state.stage {
            Stage::LakeLady => self.run_lake_lady(ctx),
            Stage::Proposal => self.run_proposal(ctx),
            Stage::Vote => self.run_vote(ctx),
            Stage::Quest => self.run_quest(ctx),
            Stage::End => self.run_assassination(ctx),
            Stage::Init | Stage::Record => Ok(()),
        }
    }

    fn run_lake_lady(&mut self, ctx: &mut TurnContext<'_>) -> Result<(), DomainError> {
        let Some(lake) = &self.state.lake_lady else {
            return Ok(());
        };
        if lake.done || !self.roster.is_automated(&lake.holder) {
            return Ok(());
        }
        // One extra slot past the pool means passing.
        let idx = pick_index(&mut *ctx.rng, lake.pool.len() + 1);
        let target = lake.pool.get(idx).cloned();
        let holder = lake.holder.clone();
        self.use_lake_lady_power(&holder, target, ctx)
    }

    fn run_proposal(&mut self, ctx: &mut TurnContext<'_>) -> Result<(), DomainError> {
        if self.state.proposal.done {
            return Ok(());
        }
        if self.state.proposal.members.is_empty() && self.roster.is_automated(&self.state.leader)
        {
            let members: Vec<String> = self
                .roster
                .names()
                .choose_multiple(&mut RngBridge::new(&mut *ctx.rng), self.state.n_members)
                .cloned()
                .collect();
            let leader = self.state.leader.clone();
            self.propose_quest(&leader, members, ctx)?;
        }
        if self.state.proposal.members.is_empty() {
            return Ok(());
        }

        self.state
            .attempt
            .pending
            .clone_from(&self.state.proposal.members);
        if self.state.is_forced_round() {
            self.state.vote.done = true;
            self.state.vote.result = Some(VoteResult::Approved);
        } else {
            self.state.vote.pending = self.roster.names();
        }
        self.state.proposal.done = true;
        Ok(())
    }

    fn run_vote(&mut self, ctx: &mut TurnContext<'_>) -> Result<(), DomainError> {
        if self.state.vote.done {
            return Ok(());
        }
        let bots: Vec<String> = self
            .state
            .vote
            .pending
            .iter()
            .filter(|p| self.roster.is_automated(p))
            .cloned()
            .collect();
        for bot in bots {
            let vote = if pick_index(&mut *ctx.rng, 2) == 0 {
                VoteCard::Approve
            } else {
                VoteCard::Reject
            };
            self.vote_quest(&bot, vote, ctx)?;
        }
        if !self.state.vote.pending.is_empty() {
            return Ok(());
        }

        let n_approve = self
            .state
            .vote
            .votes
            .values()
            .filter(|v| **v == VoteCard::Approve)
            .count();
        // Strict majority of the whole table; an even split rejects.
        let result = if n_approve > self.roster.len() / 2 {
            VoteResult::Approved
        } else {
            VoteResult::Rejected
        };
        self.state.vote.done = true;
        self.state.vote.n_approve = Some(n_approve);
        self.state.vote.result = Some(result);
        info!(
            game_id = %self.id,
            quest = self.state.quest,
            round = self.state.round,
            n_approve,
            %result,
            "vote resolved"
        );
        if result == VoteResult::Rejected {
            self.record_round(ctx);
        }
        Ok(())
    }

    fn run_quest(&mut self, ctx: &mut TurnContext<'_>) -> Result<(), DomainError> {
        if self.state.attempt.done {
            return Ok(());
        }
        let bots: Vec<String> = self
            .state
            .attempt
            .pending
            .iter()
            .filter(|p| self.roster.is_automated(p))
            .cloned()
            .collect();
        for bot in bots {
            let card = match self.roster.side_of(&bot) {
                Some(Side::Evil) if pick_index(&mut *ctx.rng, 2) == 1 => QuestCard::Fail,
                _ => QuestCard::Success,
            };
            self.do_quest(&bot, Some(card), ctx)?;
        }
        if !self.state.attempt.pending.is_empty() {
            return Ok(());
        }

        let n_fail = self
            .state
            .attempt
            .attempts
            .values()
            .filter(|a| **a == QuestCard::Fail)
            .count();
        let result = if n_fail >= self.schedule.fails_needed(self.state.quest) {
            QuestResult::Fail
        } else {
            QuestResult::Success
        };
        self.state.attempt.done = true;
        self.state.attempt.n_fail = Some(n_fail);
        self.state.attempt.result = Some(result);
        self.state.quest_results.push(result);
        info!(
            game_id = %self.id,
            quest = self.state.quest,
            n_fail,
            %result,
            "quest resolved"
        );
        self.record_round(ctx);
        self.state.win_3_quests = self.state.quest_winner();
        Ok(())
    }

    fn run_assassination(&mut self, ctx: &mut TurnContext<'_>) -> Result<(), DomainError> {
        if self.state.win_3_quests != Some(Side::Good)
            || self.state.assassination.target.is_some()
        {
            return Ok(());
        }
        let assassin = self
            .roster
            .holder_of(Character::Assassin)
            .ok_or_else(|| DomainError::Protocol("no assassin was dealt".to_owned()))?;
        if !assassin.automated {
            return Ok(());
        }
        // Known evil teammates are never worth the shot.
        let candidates: Vec<String> = self
            .roster
            .players()
            .iter()
            .filter(|p| {
                p.name != assassin.name
                    && assassin.knowledge.get(&p.name) != Some(&Knowledge::Evil)
            })
            .map(|p| p.name.clone())
            .collect();
        let name = assassin.name.clone();
        let target = candidates
            .choose(&mut RngBridge::new(&mut *ctx.rng))
            .cloned()
            .ok_or_else(|| DomainError::Protocol("the assassin has no target".to_owned()))?;
        self.assassinate(&name, &target, ctx)
    }

    fn record_round(&mut self, ctx: &TurnContext<'_>) {
        let record = RoundRecord::capture(&self.state, ctx.clock.now());
        self.record_event(
            SessionEventKind::RoundRecorded(RoundRecorded {
                quest: record.quest,
                round: record.round,
                vote_result: record.vote_result,
                quest_result: record.quest_result,
            }),
            ctx,
        );
        self.history.record(record);
    }
}
