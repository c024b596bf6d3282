//! Turns content descriptors and game state into text and tables.

use std::fmt;

use avalon_core::error::DomainError;
use comfy_table::{ContentArrangement, Table, presets};
use serde::{Deserialize, Serialize};

use super::aggregates::Game;
use super::content::{Content, View};
use super::roles::{Character, Knowledge, Side, character_pool, side_counts};
use super::state::{GameState, VoteCard};

/// State values a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Nickname,
    Quest,
    Round,
    Leader,
    Members,
    NMembers,
    PendingVotes,
    PendingAttempts,
    OwnVote,
    OwnAttempt,
    NApprove,
    VoteResult,
    NFail,
    QuestResult,
    LakeLady,
    LakeLadyTarget,
    LakeLadyTargetSide,
    LakeLadyPool,
    WinningSide,
    Assassin,
    AssassinTarget,
    AssassinCandidates,
    Merlin,
    SeatList,
}

/// Rendered body of a content entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBody {
    Text { text: String },
    Table { table: TextTable },
    Empty,
}

impl fmt::Display for ContentBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { text } => f.write_str(text),
            Self::Table { table } => table.fmt(f),
            Self::Empty => Ok(()),
        }
    }
}

/// A plain grid of strings. Serialized as-is; printed through
/// `comfy_table` with ASCII borders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TextTable {
    /// A table with the given column headers and no rows.
    #[must_use]
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row; short rows are padded with blanks when printed.
    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn to_comfy(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::ASCII_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Disabled)
            .set_header(&self.headers);
        for row in &self.rows {
            table.add_row(row);
        }
        table
    }
}

impl fmt::Display for TextTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.to_comfy())
    }
}

fn undefined(what: &str) -> DomainError {
    DomainError::Protocol(format!("{what} is not defined in the current state"))
}

fn require<T>(value: Option<T>, what: &str) -> Result<T, DomainError> {
    value.ok_or_else(|| undefined(what))
}

fn joined(names: &[String]) -> String {
    names.join(", ")
}

/// Resolves one template parameter for `view`.
///
/// # Errors
///
/// Returns `DomainError::Protocol` when the value does not exist yet, e.g.
/// the vote result before the vote closed.
pub fn param_value(param: Param, view: &View<'_>) -> Result<String, DomainError> {
    let state = view.state();
    let roster = view.roster();
    let lake = state.lake_lady.as_ref();
    let value = match param {
        Param::Nickname => view.viewer.to_owned(),
        Param::Quest => state.quest.to_string(),
        Param::Round => state.round.to_string(),
        Param::Leader => state.leader.clone(),
        Param::NMembers => state.n_members.to_string(),
        Param::Members => {
            if state.proposal.members.is_empty() {
                return Err(undefined("members"));
            }
            joined(&state.proposal.members)
        }
        Param::PendingVotes => joined(&state.vote.pending),
        Param::PendingAttempts => joined(&state.attempt.pending),
        Param::OwnVote => require(state.vote.votes.get(view.viewer), "own vote")?.to_string(),
        Param::OwnAttempt => {
            require(state.attempt.attempts.get(view.viewer), "own attempt")?.to_string()
        }
        Param::NApprove => require(state.vote.n_approve, "n_approve")?.to_string(),
        Param::VoteResult => require(state.vote.result, "vote_result")?.to_string(),
        Param::NFail => require(state.attempt.n_fail, "n_fail")?.to_string(),
        Param::QuestResult => require(state.attempt.result, "quest_result")?.to_string(),
        Param::LakeLady => require(lake, "lake_lady")?.holder.clone(),
        Param::LakeLadyTarget => {
            require(lake.and_then(|l| l.target.clone()), "lake_lady_target")?
        }
        Param::LakeLadyTargetSide => {
            let target = require(lake.and_then(|l| l.target.as_deref()), "lake_lady_target")?;
            require(roster.side_of(target), "lake_lady_target side")?.to_string()
        }
        Param::LakeLadyPool => joined(&require(lake, "lake_lady")?.pool),
        Param::WinningSide => require(state.win_3_quests, "win_3_quests")?.to_string(),
        Param::Assassin => require(roster.holder_of(Character::Assassin), "assassin")?
            .name
            .clone(),
        Param::AssassinTarget => {
            require(state.assassination.target.clone(), "assassin_target")?
        }
        Param::AssassinCandidates => {
            let assassin = require(roster.holder_of(Character::Assassin), "assassin")?;
            let candidates: Vec<String> = roster
                .names()
                .into_iter()
                .filter(|name| *name != assassin.name)
                .collect();
            joined(&candidates)
        }
        Param::Merlin => require(roster.holder_of(Character::Merlin), "merlin")?
            .name
            .clone(),
        Param::SeatList => joined(&roster.names()),
    };
    Ok(value)
}

/// Fills the `{}` placeholders of `text` with `params`, in order.
///
/// # Errors
///
/// Returns `DomainError::Protocol` when the placeholder and parameter
/// counts differ or a parameter is undefined.
pub fn render_template(
    text: &str,
    params: &[Param],
    view: &View<'_>,
) -> Result<String, DomainError> {
    let pieces: Vec<&str> = text.split("{}").collect();
    if pieces.len() != params.len() + 1 {
        return Err(DomainError::Protocol(format!(
            "template {text:?} has {} placeholders but {} params",
            pieces.len() - 1,
            params.len()
        )));
    }
    let mut out = String::with_capacity(text.len());
    for (idx, piece) in pieces.iter().enumerate() {
        out.push_str(piece);
        if let Some(param) = params.get(idx) {
            out.push_str(&param_value(*param, view)?);
        }
    }
    Ok(out)
}

/// Renders any content descriptor.
///
/// # Errors
///
/// Propagates `DomainError::Protocol` from templates and views.
pub fn render_content(content: &Content, view: &View<'_>) -> Result<ContentBody, DomainError> {
    Ok(match content {
        Content::Template { text, params } => ContentBody::Text {
            text: render_template(text, params, view)?,
        },
        Content::Computed(f) => ContentBody::Text { text: f(view)? },
        Content::Table(f) => ContentBody::Table { table: f(view)? },
        Content::Silent => ContentBody::Empty,
    })
}

fn label(name: &str, viewer: Option<&str>) -> String {
    if viewer == Some(name) {
        format!("{name}(You)")
    } else {
        name.to_owned()
    }
}

fn character_list(characters: &[Character], filler: Character) -> String {
    let mut parts: Vec<String> = characters
        .iter()
        .filter(|c| **c != filler)
        .map(ToString::to_string)
        .collect();
    let n_filler = characters.iter().filter(|c| **c == filler).count();
    if n_filler > 0 {
        parts.push(format!("{filler} x{n_filler}"));
    }
    parts.join(", ")
}

/// Table setup and current position, framed in `#` lines.
#[must_use]
pub fn game_info_summary(game: &Game) -> String {
    let config = game.config();
    let state = game.state();
    let (n_good, n_evil) = side_counts(config.player_count());
    let (good, evil) = character_pool(config);

    let mut lines = vec![
        format!("Number of players: Good {n_good}, Evil {n_evil}"),
        format!("Members for each quest: {}", game.schedule().describe()),
        format!(
            "Good characters: {}",
            character_list(&good, Character::LoyalServant)
        ),
        format!("Evil characters: {}", character_list(&evil, Character::Minion)),
        format!("Current quest: {}", state.quest),
        format!("Current vote round: {}", state.round),
        format!("Current leader: {}", state.leader),
    ];
    if let Some(holder) = state.lake_lady_holder() {
        lines.push(format!("Current lady of the lake: {holder}"));
    }

    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let rule = "#".repeat(width);
    let mut out = format!("{rule}\nGame Info\n{rule}\n");
    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&rule);
    out
}

/// What `viewer` knows about every seat.
///
/// The viewer's own row is fully revealed. Other rows show the side from
/// the viewer's knowledge map and hide the character, except that
/// Percival sees who might be Merlin.
///
/// # Errors
///
/// Returns `DomainError::Protocol` for a viewer not seated at the table.
pub fn player_info_view(game: &Game, viewer: &str) -> Result<TextTable, DomainError> {
    let roster = game.roster();
    let me = roster
        .get(viewer)
        .ok_or_else(|| DomainError::Protocol(format!("unknown player {viewer}")))?;
    let has_morgana = game.config().has_morgana;

    let mut table = TextTable::new(["nickname", "character", "side", "position"]);
    for player in roster.players() {
        let row = if player.name == me.name {
            vec![
                label(&player.name, Some(viewer)),
                player.character.to_string(),
                player.side.to_string(),
                player.position.to_string(),
            ]
        } else {
            let character = match (me.character, player.character) {
                (Character::Percival, Character::Merlin | Character::Morgana) if has_morgana => {
                    "merlin/morgana".to_owned()
                }
                (Character::Percival, Character::Merlin) => "merlin".to_owned(),
                _ => "unknown".to_owned(),
            };
            let side = me
                .knowledge
                .get(&player.name)
                .copied()
                .unwrap_or(Knowledge::Unknown);
            vec![
                player.name.clone(),
                character,
                side.to_string(),
                player.position.to_string(),
            ]
        };
        table.push_row(row);
    }
    Ok(table)
}

/// Everything about every seat, including each knowledge map. Meant for a
/// moderator or for post-game review.
#[must_use]
pub fn moderator_overview(game: &Game) -> TextTable {
    let roster = game.roster();
    let names = roster.names();
    let mut table = TextTable::new(
        ["nickname", "character", "side", "position"]
            .into_iter()
            .map(str::to_owned)
            .chain(names.iter().cloned()),
    );
    for player in roster.players() {
        let mut row = vec![
            player.name.clone(),
            player.character.to_string(),
            player.side.to_string(),
            player.position.to_string(),
        ];
        row.extend(names.iter().map(|name| {
            player
                .knowledge
                .get(name)
                .copied()
                .unwrap_or(Knowledge::Unknown)
                .to_string()
        }));
        table.push_row(row);
    }
    table
}

/// Every vote of the current round.
#[must_use]
pub fn votes_table(game: &Game, viewer: &str) -> TextTable {
    let mut table = TextTable::new(["Player", "Vote"]);
    for (name, vote) in &game.state().vote.votes {
        table.push_row(vec![label(name, Some(viewer)), vote.to_string()]);
    }
    table
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_owned(), |v| v.to_string())
}

/// All recorded rounds.
///
/// Columns are `Q R L M [LL T] <players> N_A VR N_F QR`. Votes show as
/// `o` (approve), `x` (reject) or `-` (no vote held). With `reveal`, evil
/// players carry a `*` and the fail column names who failed.
#[must_use]
pub fn history_view(game: &Game, viewer: &str, reveal: bool) -> TextTable {
    let roster = game.roster();
    let state: &GameState = game.state();
    let has_lake_lady = state.lake_lady.is_some();

    let mut names = roster.names();
    names.sort();
    let mark = |name: &str| {
        let mut text = label(name, Some(viewer));
        if reveal && roster.side_of(name) == Some(Side::Evil) {
            text.push('*');
        }
        text
    };

    let mut headers: Vec<String> = ["Q", "R", "L", "M"].map(str::to_owned).to_vec();
    if has_lake_lady {
        headers.extend(["LL", "T"].map(str::to_owned));
    }
    headers.extend(names.iter().map(|n| mark(n)));
    headers.extend(["N_A", "VR", "N_F", "QR"].map(str::to_owned));
    let mut table = TextTable::new(headers);

    for record in game.history().iter() {
        let mut row = vec![
            if record.round == 1 {
                record.quest.to_string()
            } else {
                String::new()
            },
            record.round.to_string(),
            label(&record.leader, Some(viewer)),
            record
                .members
                .iter()
                .map(|m| mark(m))
                .collect::<Vec<_>>()
                .join(", "),
        ];
        if has_lake_lady {
            row.push(or_dash(record.lake_lady.as_deref()));
            row.push(or_dash(record.lake_lady_target.as_deref()));
        }
        for name in &names {
            row.push(match record.votes.get(name) {
                Some(VoteCard::Approve) => "o".to_owned(),
                Some(VoteCard::Reject) => "x".to_owned(),
                None => "-".to_owned(),
            });
        }
        row.push(or_dash(record.n_approve));
        row.push(or_dash(record.vote_result));
        match record.quest_result {
            Some(result) => {
                if reveal {
                    let failed = record.failed_by();
                    row.push(if failed.is_empty() {
                        "-".to_owned()
                    } else {
                        failed.join(", ")
                    });
                } else {
                    row.push(or_dash(record.n_fail));
                }
                row.push(result.to_string());
            }
            None => {
                row.push("N/A".to_owned());
                row.push("N/A".to_owned());
            }
        }
        table.push_row(row);
    }
    table
}
