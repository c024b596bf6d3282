//! Quest team sizes per table size.

use serde::{Deserialize, Serialize};

/// Number of quests in a game.
pub const QUEST_COUNT: usize = 5;

/// Quest on which large tables need two fail cards.
pub const TWO_FAIL_QUEST: usize = 4;

/// Team sizes for the five quests and the two-fail rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestSchedule {
    /// Required team size, indexed by `quest - 1`.
    pub members: [usize; QUEST_COUNT],
    /// Whether quest 4 needs at least two fail cards to fail.
    pub needs_two_fails: bool,
}

impl QuestSchedule {
    /// Looks up the schedule for a table of `n_players`.
    ///
    /// Returns `None` outside the supported 5–10 range.
    #[must_use]
    pub fn for_players(n_players: usize) -> Option<Self> {
        let members = match n_players {
            5 => [2, 3, 2, 3, 3],
            6 => [2, 3, 4, 3, 4],
            7 => [2, 3, 3, 4, 4],
            8..=10 => [3, 4, 4, 5, 5],
            _ => return None,
        };
        Some(Self {
            members,
            needs_two_fails: n_players > 6,
        })
    }

    /// Team size for a 1-based quest index.
    #[must_use]
    pub fn required(&self, quest: usize) -> Option<usize> {
        quest
            .checked_sub(1)
            .and_then(|idx| self.members.get(idx).copied())
    }

    /// Fail cards needed to fail the given quest.
    #[must_use]
    pub fn fails_needed(&self, quest: usize) -> usize {
        if self.needs_two_fails && quest == TWO_FAIL_QUEST {
            2
        } else {
            1
        }
    }

    /// Team sizes rendered for the game summary, `*` marking the two-fail quest.
    #[must_use]
    pub fn describe(&self) -> String {
        self.members
            .iter()
            .enumerate()
            .map(|(idx, n)| {
                if self.needs_two_fails && idx + 1 == TWO_FAIL_QUEST {
                    format!("{n}*")
                } else {
                    n.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
