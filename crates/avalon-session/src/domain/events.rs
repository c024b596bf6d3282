//! Domain events for the Session & Progress context.

use avalon_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};

use super::roles::Side;
use super::stage::Stage;
use super::state::{QuestCard, QuestResult, VoteCard, VoteResult};

/// Emitted when roles are dealt and the game opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCreated {
    /// Player names in seat order.
    pub seats: Vec<String>,
    /// Names of the automated players.
    pub automated: Vec<String>,
    /// First leader.
    pub leader: String,
    /// First lady of the lake, when enabled.
    pub lake_lady: Option<String>,
}

/// Emitted when the leader's team is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalMade {
    pub quest: usize,
    pub round: usize,
    pub leader: String,
    pub members: Vec<String>,
}

/// Emitted for every accepted vote, including overwrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCast {
    pub quest: usize,
    pub round: usize,
    pub player: String,
    pub vote: VoteCard,
}

/// Emitted for every accepted quest card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestAttempted {
    pub quest: usize,
    pub player: String,
    pub attempt: QuestCard,
}

/// Emitted when the lady of the lake looks at a player or passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LakeLadyUsed {
    pub quest: usize,
    pub holder: String,
    /// `None` when the holder declined.
    pub target: Option<String>,
}

/// Emitted when the assassin names a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssassinationAttempted {
    pub assassin: String,
    pub target: String,
    pub success: bool,
}

/// Emitted when the shared stage moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageAdvanced {
    pub from: Stage,
    pub to: Stage,
    pub quest: usize,
    pub round: usize,
}

/// Emitted when a voting round lands in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecorded {
    pub quest: usize,
    pub round: usize,
    pub vote_result: Option<VoteResult>,
    pub quest_result: Option<QuestResult>,
}

/// Emitted once the game is over, or torn down early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEnded {
    /// `None` when the game was aborted before a winner emerged.
    pub winner: Option<Side>,
    pub quest_results: Vec<QuestResult>,
}

/// Event type identifier for [`GameCreated`].
pub const GAME_CREATED_EVENT_TYPE: &str = "session.game_created";

/// Event type identifier for [`ProposalMade`].
pub const PROPOSAL_MADE_EVENT_TYPE: &str = "session.proposal_made";

/// Event type identifier for [`VoteCast`].
pub const VOTE_CAST_EVENT_TYPE: &str = "session.vote_cast";

/// Event type identifier for [`QuestAttempted`].
pub const QUEST_ATTEMPTED_EVENT_TYPE: &str = "session.quest_attempted";

/// Event type identifier for [`LakeLadyUsed`].
pub const LAKE_LADY_USED_EVENT_TYPE: &str = "session.lake_lady_used";

/// Event type identifier for [`AssassinationAttempted`].
pub const ASSASSINATION_ATTEMPTED_EVENT_TYPE: &str = "session.assassination_attempted";

/// Event type identifier for [`StageAdvanced`].
pub const STAGE_ADVANCED_EVENT_TYPE: &str = "session.stage_advanced";

/// Event type identifier for [`RoundRecorded`].
pub const ROUND_RECORDED_EVENT_TYPE: &str = "session.round_recorded";

/// Event type identifier for [`GameEnded`].
pub const GAME_ENDED_EVENT_TYPE: &str = "session.game_ended";

/// Event payload variants for the Session & Progress context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEventKind {
    GameCreated(GameCreated),
    ProposalMade(ProposalMade),
    VoteCast(VoteCast),
    QuestAttempted(QuestAttempted),
    LakeLadyUsed(LakeLadyUsed),
    AssassinationAttempted(AssassinationAttempted),
    StageAdvanced(StageAdvanced),
    RoundRecorded(RoundRecorded),
    GameEnded(GameEnded),
}

/// Domain event envelope for the Session & Progress context.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: SessionEventKind,
}

impl SessionEventKind {
    /// Event type name for this payload.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::GameCreated(_) => GAME_CREATED_EVENT_TYPE,
            Self::ProposalMade(_) => PROPOSAL_MADE_EVENT_TYPE,
            Self::VoteCast(_) => VOTE_CAST_EVENT_TYPE,
            Self::QuestAttempted(_) => QUEST_ATTEMPTED_EVENT_TYPE,
            Self::LakeLadyUsed(_) => LAKE_LADY_USED_EVENT_TYPE,
            Self::AssassinationAttempted(_) => ASSASSINATION_ATTEMPTED_EVENT_TYPE,
            Self::StageAdvanced(_) => STAGE_ADVANCED_EVENT_TYPE,
            Self::RoundRecorded(_) => ROUND_RECORDED_EVENT_TYPE,
            Self::GameEnded(_) => GAME_ENDED_EVENT_TYPE,
        }
    }
}

impl DomainEvent for SessionEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Plain derived structs never fail to serialize.
        serde_json::to_value(&self.kind).unwrap_or_default()
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avalon_core::clock::Clock;
    use avalon_test_support::fixed_clock;
    use uuid::Uuid;

    fn envelope(kind: SessionEventKind) -> SessionEvent {
        SessionEvent {
            metadata: EventMetadata {
                event_id: Uuid::nil(),
                event_type: kind.event_type().to_owned(),
                aggregate_id: Uuid::nil(),
                sequence_number: 1,
                correlation_id: Uuid::nil(),
                occurred_at: fixed_clock().now(),
            },
            kind,
        }
    }

    #[test]
    fn test_event_type_names_are_namespaced() {
        let event = envelope(SessionEventKind::VoteCast(VoteCast {
            quest: 1,
            round: 2,
            player: "ann".to_owned(),
            vote: VoteCard::Reject,
        }));
        assert_eq!(event.event_type(), "session.vote_cast");
        assert_eq!(event.metadata().event_type, "session.vote_cast");
    }

    #[test]
    fn test_payload_round_trips_through_json() {
        let kind = SessionEventKind::StageAdvanced(StageAdvanced {
            from: Stage::Record,
            to: Stage::LakeLady,
            quest: 3,
            round: 1,
        });
        let event = envelope(kind.clone());
        let payload = event.to_payload();
        assert_eq!(payload["StageAdvanced"]["to"], "lake_lady");
        let back: SessionEventKind = serde_json::from_value(payload).unwrap();
        assert_eq!(back, kind);
    }
}
