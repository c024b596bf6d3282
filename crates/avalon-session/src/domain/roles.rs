//! Characters, sides and the hidden knowledge each seat starts with.

use std::collections::BTreeMap;
use std::fmt;

use avalon_core::rng::{DeterministicRng, RngBridge};
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};

use super::config::GameConfig;

/// Names handed to automated players, minus any a human already uses.
pub const AUTOMATED_NAME_POOL: [&str; 10] = [
    "Allan", "Bob", "Curtis", "Danny", "Evan", "Frank", "Gibson", "Harry", "Issac", "Jake",
];

/// Allegiance of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Good,
    Evil,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Good => "good",
            Self::Evil => "evil",
        })
    }
}

/// Character cards in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Character {
    Merlin,
    Percival,
    LoyalServant,
    Assassin,
    Morgana,
    Mordred,
    Oberon,
    Minion,
}

impl Character {
    /// Side the card plays for.
    #[must_use]
    pub const fn side(self) -> Side {
        match self {
            Self::Merlin | Self::Percival | Self::LoyalServant => Side::Good,
            Self::Assassin | Self::Morgana | Self::Mordred | Self::Oberon | Self::Minion => {
                Side::Evil
            }
        }
    }

    /// Display name as printed on the card.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Merlin => "merlin",
            Self::Percival => "percival",
            Self::LoyalServant => "loyal servant",
            Self::Assassin => "assassin",
            Self::Morgana => "morgana",
            Self::Mordred => "mordred",
            Self::Oberon => "oberon",
            Self::Minion => "minion",
        }
    }

    /// Filler cards carry no special power.
    #[must_use]
    pub const fn is_filler(self) -> bool {
        matches!(self, Self::LoyalServant | Self::Minion)
    }
}

impl fmt::Display for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one player believes about another player's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Knowledge {
    Good,
    Evil,
    Unknown,
    /// Percival's view of Merlin and Morgana: one of them is Merlin.
    Either,
}

impl From<Side> for Knowledge {
    fn from(side: Side) -> Self {
        match side {
            Side::Good => Self::Good,
            Side::Evil => Self::Evil,
        }
    }
}

impl fmt::Display for Knowledge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Good => "good",
            Self::Evil => "evil",
            Self::Unknown => "unknown",
            Self::Either => "either",
        })
    }
}

/// A seat at the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Unique display name.
    pub name: String,
    /// Dealt character.
    pub character: Character,
    /// Side of the dealt character.
    pub side: Side,
    /// Seat index; leadership rotates in seat order.
    pub position: usize,
    /// Facts this player holds about every seat, including their own.
    /// Entries are only ever sharpened, never revoked.
    pub knowledge: BTreeMap<String, Knowledge>,
    /// Automated players act from the sweep instead of pulling content.
    pub automated: bool,
}

/// All seats in seat order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    /// Wraps players, sorting them by seat.
    #[must_use]
    pub fn new(mut players: Vec<Player>) -> Self {
        players.sort_by_key(|p| p.position);
        Self { players }
    }

    /// Players in seat order.
    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Number of seats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Looks a player up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.name == name)
    }

    /// Whether `name` sits at this table.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names in seat order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.players.iter().map(|p| p.name.clone()).collect()
    }

    /// Names of the seats on `side`, in seat order.
    #[must_use]
    pub fn names_on(&self, side: Side) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| p.side == side)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Names of human players, in seat order.
    #[must_use]
    pub fn human_names(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| !p.automated)
            .map(|p| p.name.clone())
            .collect()
    }

    /// The player holding `character`, if it is in play.
    #[must_use]
    pub fn holder_of(&self, character: Character) -> Option<&Player> {
        self.players.iter().find(|p| p.character == character)
    }

    /// True side of `name`.
    #[must_use]
    pub fn side_of(&self, name: &str) -> Option<Side> {
        self.get(name).map(|p| p.side)
    }

    /// Whether `name` is an automated seat.
    #[must_use]
    pub fn is_automated(&self, name: &str) -> bool {
        self.get(name).is_some_and(|p| p.automated)
    }

    /// Seat after `name`, wrapping at the end of the table.
    #[must_use]
    pub fn next_after(&self, name: &str) -> Option<&Player> {
        let idx = self.players.iter().position(|p| p.name == name)?;
        self.players.get((idx + 1) % self.players.len())
    }
}

/// Good and evil seat counts for a table of `n_players`.
///
/// | players | 5 | 6 | 7 | 8 | 9 | 10 |
/// |---------|---|---|---|---|---|----|
/// | good    | 3 | 4 | 4 | 5 | 6 | 6  |
/// | evil    | 2 | 2 | 3 | 3 | 3 | 4  |
#[must_use]
pub fn side_counts(n_players: usize) -> (usize, usize) {
    let n_good = if n_players == 9 { 6 } else { n_players / 2 + 1 };
    (n_good, n_players.saturating_sub(n_good))
}

/// Builds the good and evil decks: the mandatory specials, the enabled
/// optional ones, then filler up to each side's quota.
#[must_use]
pub fn character_pool(config: &GameConfig) -> (Vec<Character>, Vec<Character>) {
    let (n_good, n_evil) = side_counts(config.player_count());

    let mut good = vec![Character::Merlin];
    if config.has_percival {
        good.push(Character::Percival);
    }
    let mut evil = vec![Character::Assassin];
    if config.has_morgana {
        evil.push(Character::Morgana);
    }
    if config.has_mordred {
        evil.push(Character::Mordred);
    }
    if config.has_oberon {
        evil.push(Character::Oberon);
    }

    good.resize(n_good.max(good.len()), Character::LoyalServant);
    evil.resize(n_evil.max(evil.len()), Character::Minion);
    (good, evil)
}

/// What `observer` learns about `target` when the game starts.
#[must_use]
pub fn derive_knowledge(config: &GameConfig, observer: Character, target: Character) -> Knowledge {
    match observer {
        Character::Merlin => {
            if config.has_mordred && (target == Character::Mordred || target.side() == Side::Good) {
                Knowledge::Unknown
            } else {
                target.side().into()
            }
        }
        Character::Percival => match target {
            Character::Merlin | Character::Morgana if config.has_morgana => Knowledge::Either,
            Character::Merlin | Character::Morgana => target.side().into(),
            _ => Knowledge::Unknown,
        },
        Character::LoyalServant => Knowledge::Unknown,
        Character::Oberon => Knowledge::Unknown,
        Character::Assassin | Character::Morgana | Character::Mordred | Character::Minion => {
            if config.has_oberon && (target == Character::Oberon || target.side() == Side::Good) {
                Knowledge::Unknown
            } else {
                target.side().into()
            }
        }
    }
}

/// Draws `count` automated player names that no human already uses.
pub fn pick_automated_names(
    humans: &[String],
    count: usize,
    rng: &mut dyn DeterministicRng,
) -> Vec<String> {
    let free: Vec<&str> = AUTOMATED_NAME_POOL
        .iter()
        .copied()
        .filter(|name| !humans.iter().any(|h| h == name))
        .collect();
    free.choose_multiple(&mut RngBridge::new(rng), count)
        .map(|name| (*name).to_owned())
        .collect()
}

/// Shuffles seats and characters independently, deals one card per seat
/// and derives every player's starting knowledge.
///
/// `config` must already be validated and `automated` must not overlap
/// `config.players`.
pub fn assign_roles(
    config: &GameConfig,
    automated: &[String],
    rng: &mut dyn DeterministicRng,
) -> Roster {
    let mut seats: Vec<String> = config
        .players
        .iter()
        .chain(automated.iter())
        .cloned()
        .collect();
    seats.shuffle(&mut RngBridge::new(&mut *rng));

    let (good, evil) = character_pool(config);
    let mut deck: Vec<Character> = good.into_iter().chain(evil).collect();
    deck.shuffle(&mut RngBridge::new(rng));

    let mut players: Vec<Player> = seats
        .into_iter()
        .zip(deck)
        .enumerate()
        .map(|(position, (name, character))| Player {
            automated: automated.contains(&name),
            name,
            character,
            side: character.side(),
            position,
            knowledge: BTreeMap::new(),
        })
        .collect();

    let dealt: Vec<(String, Character)> = players
        .iter()
        .map(|p| (p.name.clone(), p.character))
        .collect();
    for player in &mut players {
        player.knowledge = dealt
            .iter()
            .map(|(name, target)| {
                (name.clone(), derive_knowledge(config, player.character, *target))
            })
            .collect();
    }

    Roster::new(players)
}

#[cfg(test)]
mod tests {
    use super::*;
    use avalon_core::rng::SeededRng;
    use avalon_test_support::MockRng;

    fn config(n: usize) -> GameConfig {
        GameConfig::new((1..=n).map(|i| format!("p{i}")))
    }

    fn count(roster: &Roster, observer: Character, knowledge: Knowledge) -> usize {
        roster
            .holder_of(observer)
            .unwrap()
            .knowledge
            .values()
            .filter(|k| **k == knowledge)
            .count()
    }

    #[test]
    fn test_side_counts_match_the_canonical_table() {
        let expected = [(5, 3, 2), (6, 4, 2), (7, 4, 3), (8, 5, 3), (9, 6, 3), (10, 6, 4)];
        for (n, good, evil) in expected {
            assert_eq!(side_counts(n), (good, evil), "{n} players");
            assert_eq!(good + evil, n);
        }
    }

    #[test]
    fn test_character_pool_pads_with_filler() {
        let (good, evil) = character_pool(&config(7).with_percival());
        assert_eq!(
            good,
            vec![
                Character::Merlin,
                Character::Percival,
                Character::LoyalServant,
                Character::LoyalServant
            ]
        );
        assert_eq!(
            evil,
            vec![Character::Assassin, Character::Minion, Character::Minion]
        );
    }

    #[test]
    fn test_assign_roles_deals_every_seat_once() {
        let roster = assign_roles(&config(8), &[], &mut SeededRng::from_seed(11));
        assert_eq!(roster.len(), 8);
        let positions: Vec<usize> = roster.players().iter().map(|p| p.position).collect();
        assert_eq!(positions, (0..8).collect::<Vec<_>>());
        assert_eq!(roster.names_on(Side::Good).len(), 5);
        assert_eq!(roster.names_on(Side::Evil).len(), 3);
        assert!(roster.holder_of(Character::Merlin).is_some());
        assert!(roster.holder_of(Character::Assassin).is_some());
    }

    #[test]
    fn test_assign_roles_marks_automated_seats() {
        let cfg = GameConfig::new(["ann", "bo"]).with_automated(3);
        let bots = pick_automated_names(&cfg.players, 3, &mut MockRng);
        let roster = assign_roles(&cfg, &bots, &mut MockRng);
        assert_eq!(roster.human_names().len(), 2);
        for bot in &bots {
            assert!(roster.is_automated(bot));
        }
        assert!(!roster.is_automated("ann"));
    }

    #[test]
    fn test_pick_automated_names_skips_human_collisions() {
        let humans = vec!["Allan".to_owned(), "Bob".to_owned()];
        let names = pick_automated_names(&humans, 8, &mut MockRng);
        assert_eq!(names.len(), 8);
        assert!(!names.contains(&"Allan".to_owned()));
        assert!(!names.contains(&"Bob".to_owned()));
    }

    #[test]
    fn test_merlin_sees_every_side_without_mordred() {
        let roster = assign_roles(&config(7), &[], &mut SeededRng::from_seed(5));
        let merlin = roster.holder_of(Character::Merlin).unwrap();
        for player in roster.players() {
            assert_eq!(merlin.knowledge[&player.name], Knowledge::from(player.side));
        }
        assert_eq!(count(&roster, Character::Merlin, Knowledge::Unknown), 0);
    }

    #[test]
    fn test_merlin_cannot_see_mordred() {
        let cfg = config(7).with_mordred();
        let roster = assign_roles(&cfg, &[], &mut SeededRng::from_seed(5));
        let (n_good, _) = side_counts(7);
        assert_eq!(count(&roster, Character::Merlin, Knowledge::Unknown), n_good + 1);
        let mordred = roster.holder_of(Character::Mordred).unwrap();
        let merlin = roster.holder_of(Character::Merlin).unwrap();
        assert_eq!(merlin.knowledge[&mordred.name], Knowledge::Unknown);
    }

    #[test]
    fn test_percival_sees_either_when_morgana_is_in_play() {
        let cfg = config(7).with_percival().with_morgana();
        let roster = assign_roles(&cfg, &[], &mut SeededRng::from_seed(9));
        let percival = roster.holder_of(Character::Percival).unwrap();
        for target in [Character::Merlin, Character::Morgana] {
            let name = &roster.holder_of(target).unwrap().name;
            assert_eq!(percival.knowledge[name], Knowledge::Either);
        }
        assert_eq!(count(&roster, Character::Percival, Knowledge::Either), 2);
        assert_eq!(count(&roster, Character::Percival, Knowledge::Unknown), 5);
    }

    #[test]
    fn test_percival_sees_merlin_as_good_without_morgana() {
        let cfg = config(6).with_percival();
        let roster = assign_roles(&cfg, &[], &mut SeededRng::from_seed(2));
        let percival = roster.holder_of(Character::Percival).unwrap();
        let merlin = &roster.holder_of(Character::Merlin).unwrap().name;
        assert_eq!(percival.knowledge[merlin], Knowledge::Good);
        assert_eq!(count(&roster, Character::Percival, Knowledge::Unknown), 5);
    }

    #[test]
    fn test_loyal_servants_know_nothing() {
        let roster = assign_roles(&config(5), &[], &mut SeededRng::from_seed(3));
        for servant in roster
            .players()
            .iter()
            .filter(|p| p.character == Character::LoyalServant)
        {
            assert!(servant.knowledge.values().all(|k| *k == Knowledge::Unknown));
        }
    }

    #[test]
    fn test_oberon_is_hidden_from_evil_and_blind() {
        let cfg = config(10).with_oberon();
        let roster = assign_roles(&cfg, &[], &mut SeededRng::from_seed(4));
        let oberon = roster.holder_of(Character::Oberon).unwrap();
        assert!(oberon.knowledge.values().all(|k| *k == Knowledge::Unknown));

        let assassin = roster.holder_of(Character::Assassin).unwrap();
        assert_eq!(assassin.knowledge[&oberon.name], Knowledge::Unknown);
        // 10 players: 4 evil, Oberon hidden, so 3 known evil.
        assert_eq!(count(&roster, Character::Assassin, Knowledge::Evil), 3);

        let merlin = roster.holder_of(Character::Merlin).unwrap();
        assert_eq!(merlin.knowledge[&oberon.name], Knowledge::Evil);
    }

    #[test]
    fn test_evil_sees_true_sides_without_oberon() {
        let roster = assign_roles(&config(6), &[], &mut SeededRng::from_seed(8));
        let assassin = roster.holder_of(Character::Assassin).unwrap();
        for player in roster.players() {
            assert_eq!(assassin.knowledge[&player.name], Knowledge::from(player.side));
        }
    }

    #[test]
    fn test_next_after_wraps_to_first_seat() {
        let roster = assign_roles(&config(5), &[], &mut MockRng);
        let names = roster.names();
        assert_eq!(roster.next_after(&names[4]).unwrap().name, names[0]);
        assert_eq!(roster.next_after(&names[1]).unwrap().name, names[2]);
    }
}
