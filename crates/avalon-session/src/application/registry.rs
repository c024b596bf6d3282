//! Registry of live games.
//!
//! Each game sits behind its own mutex together with the random source
//! its automated players draw from. Writers additionally hold the game's
//! commit lock from the domain call until the action log has accepted
//! its events, so at most one change per game is in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use avalon_core::clock::Clock;
use avalon_core::error::DomainError;
use avalon_core::rng::DeterministicRng;
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::{Game, TurnContext};

/// One live game and the random source that drives it.
pub struct GameSession {
    pub(crate) game: Game,
    rng: Box<dyn DeterministicRng>,
}

impl GameSession {
    #[must_use]
    pub fn new(game: Game, rng: Box<dyn DeterministicRng>) -> Self {
        Self { game, rng }
    }

    #[must_use]
    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Runs `f` against the game with a turn context built from this
    /// session's random source.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns.
    pub fn run<T>(
        &mut self,
        correlation_id: Uuid,
        clock: &dyn Clock,
        f: impl FnOnce(&mut Game, &mut TurnContext<'_>) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let mut ctx = TurnContext {
            correlation_id,
            clock,
            rng: self.rng.as_mut(),
        };
        f(&mut self.game, &mut ctx)
    }

    /// Runs `f` against a copy of the game and hands the copy back. The
    /// live game is untouched until [`GameSession::commit`].
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns; the copy is dropped.
    pub fn run_staged<T>(
        &mut self,
        correlation_id: Uuid,
        clock: &dyn Clock,
        f: impl FnOnce(&mut Game, &mut TurnContext<'_>) -> Result<T, DomainError>,
    ) -> Result<(Game, T), DomainError> {
        let mut staged = self.game.clone();
        let mut ctx = TurnContext {
            correlation_id,
            clock,
            rng: self.rng.as_mut(),
        };
        let out = f(&mut staged, &mut ctx)?;
        Ok((staged, out))
    }

    /// Replaces the live game with a staged copy.
    pub fn commit(&mut self, staged: Game) {
        self.game = staged;
    }
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("game_id", &self.game.id)
            .field("stage", &self.game.current_stage())
            .finish_non_exhaustive()
    }
}

/// One registered game: the session and its commit lock.
#[derive(Debug)]
pub struct GameSlot {
    session: Mutex<GameSession>,
    commit: tokio::sync::Mutex<()>,
}

impl GameSlot {
    fn new(session: GameSession) -> Self {
        Self {
            session: Mutex::new(session),
            commit: tokio::sync::Mutex::new(()),
        }
    }

    /// Locks the session and runs `f` on it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` for a poisoned lock, or
    /// whatever `f` returns.
    pub fn with<T>(
        &self,
        f: impl FnOnce(&mut GameSession) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let mut session = self.session.lock().map_err(|_| poisoned("game"))?;
        f(&mut session)
    }

    /// Lock held by a writer until its events are in the action log.
    #[must_use]
    pub fn commit_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.commit
    }
}

/// Shared handle to one registered game.
pub type SessionHandle = Arc<GameSlot>;

/// Games keyed by identifier, with an explicit create/destroy lifecycle.
#[derive(Debug, Default)]
pub struct GameRegistry {
    games: RwLock<HashMap<Uuid, SessionHandle>>,
}

fn poisoned(what: &str) -> DomainError {
    DomainError::Infrastructure(format!("{what} lock poisoned"))
}

impl GameRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session under its game's identifier.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Protocol` if the identifier is taken and
    /// `DomainError::Infrastructure` if the registry lock is poisoned.
    pub fn create(&self, session: GameSession) -> Result<Uuid, DomainError> {
        let id = session.game.id;
        let mut games = self.games.write().map_err(|_| poisoned("registry"))?;
        if games.contains_key(&id) {
            return Err(DomainError::Protocol(format!("game {id} already exists")));
        }
        games.insert(id, Arc::new(GameSlot::new(session)));
        info!(game_id = %id, live = games.len(), "game registered");
        Ok(id)
    }

    /// Looks a game up.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::GameNotFound` for an unknown identifier.
    pub fn get(&self, id: Uuid) -> Result<SessionHandle, DomainError> {
        self.games
            .read()
            .map_err(|_| poisoned("registry"))?
            .get(&id)
            .cloned()
            .ok_or(DomainError::GameNotFound(id))
    }

    /// Locks one game and runs `f` on it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::GameNotFound` for an unknown identifier,
    /// `DomainError::Infrastructure` for a poisoned lock, or whatever `f`
    /// returns.
    pub fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut GameSession) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        self.get(id)?.with(f)
    }

    /// Removes a game. Handles already taken stay usable until dropped,
    /// but the game can no longer be looked up.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::GameNotFound` for an unknown identifier.
    pub fn destroy(&self, id: Uuid) -> Result<(), DomainError> {
        let mut games = self.games.write().map_err(|_| poisoned("registry"))?;
        games.remove(&id).ok_or(DomainError::GameNotFound(id))?;
        info!(game_id = %id, live = games.len(), "game destroyed");
        Ok(())
    }

    /// Identifiers of every live game.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the registry lock is
    /// poisoned.
    pub fn ids(&self) -> Result<Vec<Uuid>, DomainError> {
        let games = self.games.read().map_err(|_| poisoned("registry"))?;
        Ok(games.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::GameConfig;
    use crate::domain::stage::Stage;
    use avalon_test_support::{MockRng, fixed_clock};

    fn session() -> GameSession {
        let clock = fixed_clock();
        let mut rng = MockRng;
        let mut ctx = TurnContext {
            correlation_id: Uuid::nil(),
            clock: &clock,
            rng: &mut rng,
        };
        let config = GameConfig::new(["ann", "bea"]).with_automated(3);
        let game = Game::new(Uuid::new_v4(), config, &mut ctx).unwrap();
        GameSession::new(game, Box::new(MockRng))
    }

    #[test]
    fn test_create_get_destroy_lifecycle() {
        let registry = GameRegistry::new();
        let id = registry.create(session()).unwrap();

        assert_eq!(registry.ids().unwrap(), vec![id]);
        let stage = registry
            .with_session(id, |s| Ok(s.game().current_stage()))
            .unwrap();
        assert_eq!(stage, Stage::Init);

        registry.destroy(id).unwrap();
        assert!(registry.ids().unwrap().is_empty());
        match registry.get(id).unwrap_err() {
            DomainError::GameNotFound(missing) => assert_eq!(missing, id),
            other => panic!("expected GameNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_destroy_unknown_game_is_not_found() {
        let registry = GameRegistry::new();
        assert!(matches!(
            registry.destroy(Uuid::new_v4()),
            Err(DomainError::GameNotFound(_))
        ));
    }

    #[test]
    fn test_create_rejects_duplicate_id() {
        let registry = GameRegistry::new();
        let first = session();
        let id = first.game.id;
        registry.create(first).unwrap();

        let mut second = session();
        second.game.id = id;
        assert!(matches!(
            registry.create(second),
            Err(DomainError::Protocol(_))
        ));
    }

    #[test]
    fn test_run_drives_the_game_with_the_session_rng() {
        let registry = GameRegistry::new();
        let id = registry.create(session()).unwrap();
        let clock = fixed_clock();

        let moved = registry
            .with_session(id, |s| s.run(Uuid::nil(), &clock, |game, ctx| game.sweep(ctx)))
            .unwrap();

        assert!(!moved, "humans have not read the init stage yet");
    }

    #[test]
    fn test_staged_run_only_lands_on_commit() {
        let registry = GameRegistry::new();
        let id = registry.create(session()).unwrap();
        let clock = fixed_clock();

        let staged = registry
            .with_session(id, |s| {
                s.run_staged(Uuid::nil(), &clock, |game, ctx| {
                    game.abort(ctx);
                    Ok(())
                })
            })
            .unwrap()
            .0;
        assert!(staged.is_end_game());
        assert!(!registry.with_session(id, |s| Ok(s.game().is_end_game())).unwrap());

        registry
            .with_session(id, |s| {
                s.commit(staged);
                Ok(())
            })
            .unwrap();
        assert!(registry.with_session(id, |s| Ok(s.game().is_end_game())).unwrap());
    }
}
