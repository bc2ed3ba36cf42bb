//! revgate — AI code review gate for CI (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod config;
pub mod constants;
pub mod env;
pub mod fixes;
pub mod gate;
pub mod host;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod report;
pub mod reviewer;
pub mod rules;
