//! Append-only log of completed voting rounds.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{GameState, QuestCard, QuestResult, VoteCard, VoteResult};

/// One finished voting round, frozen when it is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub quest: usize,
    pub round: usize,
    pub leader: String,
    pub members: Vec<String>,
    pub lake_lady: Option<String>,
    pub lake_lady_target: Option<String>,
    pub votes: BTreeMap<String, VoteCard>,
    pub n_approve: Option<usize>,
    pub vote_result: Option<VoteResult>,
    pub attempts: BTreeMap<String, QuestCard>,
    pub n_fail: Option<usize>,
    pub quest_result: Option<QuestResult>,
    pub recorded_at: DateTime<Utc>,
}

impl RoundRecord {
    /// Copies the round fields out of `state`.
    #[must_use]
    pub fn capture(state: &GameState, recorded_at: DateTime<Utc>) -> Self {
        let (lake_lady, lake_lady_target) = state
            .lake_lady
            .as_ref()
            .map_or((None, None), |l| (Some(l.holder.clone()), l.target.clone()));
        Self {
            quest: state.quest,
            round: state.round,
            leader: state.leader.clone(),
            members: state.proposal.members.clone(),
            lake_lady,
            lake_lady_target,
            votes: state.vote.votes.clone(),
            n_approve: state.vote.n_approve,
            vote_result: state.vote.result,
            attempts: state.attempt.attempts.clone(),
            n_fail: state.attempt.n_fail,
            quest_result: state.attempt.result,
            recorded_at,
        }
    }

    /// Members who played a fail card.
    #[must_use]
    pub fn failed_by(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter(|(_, card)| **card == QuestCard::Fail)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Completed rounds grouped by quest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    quests: BTreeMap<usize, Vec<RoundRecord>>,
}

impl History {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record under its quest.
    pub fn record(&mut self, record: RoundRecord) {
        self.quests.entry(record.quest).or_default().push(record);
    }

    /// Rounds recorded for `quest`, oldest first.
    #[must_use]
    pub fn rounds(&self, quest: usize) -> &[RoundRecord] {
        self.quests.get(&quest).map_or(&[], Vec::as_slice)
    }

    /// Every record in quest then round order.
    pub fn iter(&self) -> impl Iterator<Item = &RoundRecord> {
        self.quests.values().flatten()
    }

    /// Total number of recorded rounds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quests.values().map(Vec::len).sum()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }

    /// The most recent record.
    #[must_use]
    pub fn last(&self) -> Option<&RoundRecord> {
        self.quests.values().next_back().and_then(|rounds| rounds.last())
    }
}
