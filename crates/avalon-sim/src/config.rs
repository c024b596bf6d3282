//! Simulator configuration read from `AVALON_*` environment variables.

use std::path::PathBuf;

use avalon_session::domain::config::GameConfig;

use crate::error::AppError;

/// Everything one simulator run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Table settings; every seat is automated.
    pub game: GameConfig,
    /// How many games to play.
    pub games: usize,
    /// Seed for the first game; game `i` uses `seed + i`. Entropy when
    /// absent.
    pub seed: Option<u64>,
    /// Append-only action log, if any.
    pub log_path: Option<PathBuf>,
}

impl SimConfig {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for malformed values or a table that
    /// cannot be dealt.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, defaulting anything unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for malformed values or a table that
    /// cannot be dealt.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let players = number(&lookup, "AVALON_PLAYERS")?.unwrap_or(5);
        let mut game = GameConfig::new(Vec::<String>::new()).with_automated(players);
        if flag(&lookup, "AVALON_PERCIVAL")? {
            game = game.with_percival();
        }
        if flag(&lookup, "AVALON_MORGANA")? {
            game = game.with_morgana();
        }
        if flag(&lookup, "AVALON_MORDRED")? {
            game = game.with_mordred();
        }
        if flag(&lookup, "AVALON_OBERON")? {
            game = game.with_oberon();
        }
        if flag(&lookup, "AVALON_LAKE_LADY")? {
            game = game.with_lake_lady();
        }
        game.validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let games = number(&lookup, "AVALON_GAMES")?.unwrap_or(1);
        if games == 0 {
            return Err(AppError::Config("AVALON_GAMES must be at least 1".into()));
        }
        let seed = number(&lookup, "AVALON_SEED")?;
        let log_path = lookup("AVALON_LOG")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            game,
            games,
            seed,
            log_path,
        })
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<bool, AppError> {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "" | "0" | "false" | "no" | "off" => Ok(false),
            "1" | "true" | "yes" | "on" => Ok(true),
            _ => Err(AppError::Config(format!("{key} must be a boolean, got {v:?}"))),
        },
    }
}

fn number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, AppError> {
    lookup(key)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| AppError::Config(format!("{key} must be a number, got {v:?}")))
        })
        .transpose()
}
