//! Avalon Core: shared domain abstractions.
//!
//! Traits and types the session engine is written against: the error
//! taxonomy, time and randomness seams, commands, events and the event
//! log. No game rules live here.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod repository;
pub mod rng;
