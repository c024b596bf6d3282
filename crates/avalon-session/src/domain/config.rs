//! Game configuration and its validation.

use std::collections::BTreeSet;

use avalon_core::error::DomainError;
use serde::{Deserialize, Serialize};

use super::roles::side_counts;

/// Smallest supported table.
pub const MIN_PLAYERS: usize = 5;

/// Largest supported table.
pub const MAX_PLAYERS: usize = 10;

/// Settings chosen before the deal. Immutable once a game is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Names of the human (tracked) players.
    pub players: Vec<String>,
    /// Adds Percival to the good side.
    pub has_percival: bool,
    /// Adds Morgana to the evil side.
    pub has_morgana: bool,
    /// Adds Mordred to the evil side.
    pub has_mordred: bool,
    /// Adds Oberon to the evil side.
    pub has_oberon: bool,
    /// Enables the lady of the lake.
    pub has_lake_lady: bool,
    /// Number of automated players drawn from the name pool.
    pub automated_players: usize,
}

impl GameConfig {
    /// A configuration with the given human players and no optional rules.
    #[must_use]
    pub fn new<I, S>(players: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            players: players.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the number of automated players.
    #[must_use]
    pub fn with_automated(mut self, count: usize) -> Self {
        self.automated_players = count;
        self
    }

    /// Enables Percival.
    #[must_use]
    pub fn with_percival(mut self) -> Self {
        self.has_percival = true;
        self
    }

    /// Enables Morgana.
    #[must_use]
    pub fn with_morgana(mut self) -> Self {
        self.has_morgana = true;
        self
    }

    /// Enables Mordred.
    #[must_use]
    pub fn with_mordred(mut self) -> Self {
        self.has_mordred = true;
        self
    }

    /// Enables Oberon.
    #[must_use]
    pub fn with_oberon(mut self) -> Self {
        self.has_oberon = true;
        self
    }

    /// Enables the lady of the lake.
    #[must_use]
    pub fn with_lake_lady(mut self) -> Self {
        self.has_lake_lady = true;
        self
    }

    /// Total seats at the table.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len() + self.automated_players
    }

    /// Evil characters the options require: the assassin plus every enabled
    /// optional evil role.
    #[must_use]
    pub fn special_evil_count(&self) -> usize {
        1 + usize::from(self.has_morgana)
            + usize::from(self.has_mordred)
            + usize::from(self.has_oberon)
    }

    /// Checks that the configuration can produce a legal game.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Config` for a player count outside 5–10, blank
    /// or duplicate names, or more special evil characters than evil seats.
    /// The automated name pool holds ten names, so any legal table size
    /// leaves enough of them free.
    pub fn validate(&self) -> Result<(), DomainError> {
        let n_players = self.player_count();
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&n_players) {
            return Err(DomainError::Config(format!(
                "have to be {MIN_PLAYERS} to {MAX_PLAYERS} players, got {n_players}"
            )));
        }

        if self.players.iter().any(|name| name.trim().is_empty()) {
            return Err(DomainError::Config("player names must not be blank".to_owned()));
        }

        let unique: BTreeSet<&str> = self.players.iter().map(String::as_str).collect();
        if unique.len() != self.players.len() {
            return Err(DomainError::Config("all player names must be unique".to_owned()));
        }

        let (_, n_evil) = side_counts(n_players);
        if self.special_evil_count() > n_evil {
            return Err(DomainError::Config(format!(
                "too many evil characters: {} special evil roles for {n_evil} evil seats",
                self.special_evil_count()
            )));
        }

        Ok(())
    }
}
