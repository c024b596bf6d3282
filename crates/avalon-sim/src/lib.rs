//! Avalon simulator: plays fully automated games from environment
//! configuration and optionally writes the append-only action log.

pub mod config;
pub mod error;
pub mod log_repository;
pub mod runner;
