//! Subcommand implementations.

pub mod config;
pub mod health;
pub mod history;
pub mod posts;
pub mod schedule;
pub mod status;
pub mod trigger;
