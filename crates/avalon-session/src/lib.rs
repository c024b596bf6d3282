//! Avalon Session & Progress bounded context.
//!
//! Responsible for a single game of Avalon from role assignment to the
//! final assassination: the shared game state, the stage machine that
//! moves it forward, validation of player actions, and the per-player
//! content cursors that let every client read the game at its own pace.

pub mod application;
pub mod domain;
