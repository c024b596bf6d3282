//! Domain layer of the Session & Progress context.

pub mod actions;
pub mod aggregates;
pub mod commands;
pub mod config;
pub mod content;
pub mod events;
pub mod history;
pub mod render;
pub mod roles;
pub mod schedule;
pub mod stage;
pub mod state;
