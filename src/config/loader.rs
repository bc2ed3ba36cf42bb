//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `.revgate.toml` in repo root
//! 4. `~/.config/revgate/config.toml` (global defaults)
//! 5. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::env::Env;
use crate::gate::GateThresholds;
use crate::models::ProviderName;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub review: ReviewPolicy,
    pub gate: GateThresholds,
    pub provider: ProviderConfig,
    pub host: HostConfig,
    pub artifacts: ArtifactsConfig,
}

/// Review policy: what blocks the gate and what gets published.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewPolicy {
    /// When true, warnings fail the gate alongside criticals.
    pub strict: bool,
    /// When false, a context refusal exits 0 instead of 2.
    pub fail_on_insufficient_context: bool,
    /// When false, nothing is posted back to the host.
    pub publish: bool,
    /// Rule ids to disable, e.g. `["MNT004"]`.
    pub disabled_rules: Vec<String>,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            strict: false,
            fail_on_insufficient_context: true,
            publish: true,
            disabled_rules: Vec::new(),
        }
    }
}

/// LLM provider configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: ProviderName,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: ProviderName::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

/// Host API configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HostConfig {
    /// Base URL of the host REST API, for GitHub Enterprise and
    /// compatible forges. Environment variables take precedence.
    pub api_url: Option<String>,
}

/// Artifact output paths, relative to the working directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub report_file: PathBuf,
    pub summary_file: PathBuf,
    pub patch_file: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            report_file: PathBuf::from(crate::constants::REPORT_FILENAME),
            summary_file: PathBuf::from(crate::constants::SUMMARY_FILENAME),
            patch_file: PathBuf::from(crate::constants::PATCH_FILENAME),
        }
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads from global config, repo-local config, then applies
    /// environment variable overrides.
    pub fn load(repo_root: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 4: global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        // Layer 3: repo-local config
        if let Some(root) = repo_root {
            let local_path = root.join(crate::constants::CONFIG_FILENAME);
            if local_path.exists() {
                let local = Self::load_file(&local_path)?;
                config.merge(local);
            }
        }

        // Layer 2: environment variables
        config.apply_env_vars(env);

        Ok(config)
    }

    /// Load a config from a specific file.
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(crate::constants::CONFIG_DIR).join("config.toml"))
    }

    /// Merge another config into this one (other takes precedence for non-default values).
    ///
    /// Uses a partial-config pattern: only fields that differ from the
    /// built-in defaults are treated as explicitly set.
    fn merge(&mut self, other: Config) {
        // Review policy
        if other.review.strict {
            self.review.strict = true;
        }
        if !other.review.fail_on_insufficient_context {
            self.review.fail_on_insufficient_context = false;
        }
        if !other.review.publish {
            self.review.publish = false;
        }
        if !other.review.disabled_rules.is_empty() {
            self.review.disabled_rules = other.review.disabled_rules;
        }

        // Gate thresholds
        let default_gate = GateThresholds::default();
        if other.gate.max_files != default_gate.max_files {
            self.gate.max_files = other.gate.max_files;
        }
        if other.gate.max_lines != default_gate.max_lines {
            self.gate.max_lines = other.gate.max_lines;
        }
        if other.gate.min_cohesion != default_gate.min_cohesion {
            self.gate.min_cohesion = other.gate.min_cohesion;
        }
        if other.gate.max_complexity != default_gate.max_complexity {
            self.gate.max_complexity = other.gate.max_complexity;
        }

        // Provider settings
        let default_provider = ProviderConfig::default();
        if other.provider.name != default_provider.name {
            self.provider.name = other.provider.name;
        }
        if other.provider.model != default_provider.model {
            self.provider.model = other.provider.model;
        }
        if other.provider.base_url.is_some() {
            self.provider.base_url = other.provider.base_url;
        }
        if other.provider.api_key.is_some() {
            self.provider.api_key = other.provider.api_key;
        }

        // Host settings
        if other.host.api_url.is_some() {
            self.host.api_url = other.host.api_url;
        }

        // Artifact paths
        let default_artifacts = ArtifactsConfig::default();
        if other.artifacts.report_file != default_artifacts.report_file {
            self.artifacts.report_file = other.artifacts.report_file;
        }
        if other.artifacts.summary_file != default_artifacts.summary_file {
            self.artifacts.summary_file = other.artifacts.summary_file;
        }
        if other.artifacts.patch_file != default_artifacts.patch_file {
            self.artifacts.patch_file = other.artifacts.patch_file;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        if let Ok(val) = env.var(crate::constants::ENV_PROVIDER) {
            if let Ok(name) = val.parse::<ProviderName>() {
                self.provider.name = name;
            } else {
                eprintln!(
                    "Warning: ignoring invalid {} value: {val}",
                    crate::constants::ENV_PROVIDER
                );
            }
        }
        if let Ok(val) = env.var(crate::constants::ENV_MODEL) {
            self.provider.model = val;
        }
        if let Ok(val) = env.var(crate::constants::ENV_BASE_URL) {
            self.provider.base_url = Some(val);
        }

        // Provider-specific API key resolution
        let api_key = env
            .var(crate::constants::ENV_API_KEY)
            .or_else(|_| env.var(self.provider.name.api_key_env_var()))
            .ok();
        if api_key.is_some() {
            self.provider.api_key = api_key;
        }

        // Review policy flags
        if env.is_set(crate::constants::ENV_STRICT) {
            match env.flag(crate::constants::ENV_STRICT) {
                Some(strict) => self.review.strict = strict,
                None => eprintln!(
                    "Warning: ignoring invalid {} value",
                    crate::constants::ENV_STRICT
                ),
            }
        }
        if env.is_set(crate::constants::ENV_FAIL_ON_INSUFFICIENT_CONTEXT) {
            match env.flag(crate::constants::ENV_FAIL_ON_INSUFFICIENT_CONTEXT) {
                Some(fail) => self.review.fail_on_insufficient_context = fail,
                None => eprintln!(
                    "Warning: ignoring invalid {} value",
                    crate::constants::ENV_FAIL_ON_INSUFFICIENT_CONTEXT
                ),
            }
        }

        // Gate thresholds
        if let Ok(val) = env.var(crate::constants::ENV_MAX_FILES) {
            match val.parse::<usize>() {
                Ok(n) => self.gate.max_files = n,
                Err(_) => eprintln!(
                    "Warning: ignoring invalid {} value: {val}",
                    crate::constants::ENV_MAX_FILES
                ),
            }
        }
        if let Ok(val) = env.var(crate::constants::ENV_MAX_LINES) {
            match val.parse::<usize>() {
                Ok(n) => self.gate.max_lines = n,
                Err(_) => eprintln!(
                    "Warning: ignoring invalid {} value: {val}",
                    crate::constants::ENV_MAX_LINES
                ),
            }
        }
    }
}
