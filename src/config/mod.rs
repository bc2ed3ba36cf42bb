//! Configuration loading and layering.
//!
//! Handles `.revgate.toml` loading, environment variable resolution,
//! and CLI flag merging with proper priority ordering.

pub mod loader;

pub use loader::{ArtifactsConfig, Config, HostConfig, ProviderConfig, ReviewPolicy};
