//! Engine configuration
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables: `ASM_MAX_DEPTH`, `ASM_IDLE_FALLBACK_MS`, `ASM_LOG`
//! 2. Config file (TOML)
//! 3. Built-in defaults
//!
//! # Example Config File
//!
//! ```toml
//! [composition]
//! max_depth = 32
//! validate_routes_on_build = true
//!
//! [factories]
//! concurrent_tiers = true
//!
//! [hydration]
//! idle_fallback_ms = 1500
//! marker_tag = "asm-island"
//!
//! [logging]
//! filter = "asm_render=debug,info"
//! ```

use std::path::Path;

use asm_core::marker::DEFAULT_TAG;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tree composition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Deepest allowed nesting level
    pub max_depth: usize,
    /// Dry-run composition of every routed blueprint at build time
    pub validate_routes_on_build: bool,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            validate_routes_on_build: true,
        }
    }
}

/// Factory scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Run equal-priority units concurrently
    pub concurrent_tiers: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self { concurrent_tiers: true }
    }
}

/// Hydration settings, shared with the client runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrationConfig {
    /// Window after which `idle` islands activate without an idle signal
    pub idle_fallback_ms: u64,
    /// Marker element name
    pub marker_tag: String,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            idle_fallback_ms: 2000,
            marker_tag: DEFAULT_TAG.to_string(),
        }
    }
}

/// Logging settings (read by the binary installing the logger)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `env_logger` filter directive
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub composition: CompositionConfig,
    pub factories: FactoryConfig,
    pub hydration: HydrationConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        log::info!("Loaded engine config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Defaults, then the file if given, then environment overrides
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from any variable source
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(value) = lookup("ASM_MAX_DEPTH") {
            self.composition.max_depth = parse_env("ASM_MAX_DEPTH", &value)?;
            log::info!("max_depth from env: {}", self.composition.max_depth);
        }
        if let Some(value) = lookup("ASM_IDLE_FALLBACK_MS") {
            self.hydration.idle_fallback_ms = parse_env("ASM_IDLE_FALLBACK_MS", &value)?;
        }
        if let Some(value) = lookup("ASM_LOG") {
            if !value.is_empty() {
                self.logging.filter = value;
            }
        }
        self.validate()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.composition.max_depth == 0 {
            return Err(ConfigError::Validation(
                "composition.max_depth must be at least 1".to_string(),
            ));
        }
        let tag = &self.hydration.marker_tag;
        let valid_tag = tag.contains('-')
            && tag
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid_tag {
            return Err(ConfigError::Validation(format!(
                "hydration.marker_tag '{}' must be a lowercase custom element name",
                tag
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}
