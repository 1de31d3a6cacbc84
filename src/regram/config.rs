//! Configuration loading.
//!
//! `defaults/regram.default.toml` is embedded into the crate so the documented
//! defaults and runtime behavior stay in sync. Callers layer user files and
//! individual overrides on top via [`Loader`] before deserializing into
//! [`RegramConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use log::LevelFilter;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../../defaults/regram.default.toml");

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegramConfig {
    pub parse: ParseConfig,
    pub output: OutputConfig,
    pub log: LogConfig,
}

/// Tree builder knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ParseConfig {
    pub max_depth: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Name of a registered format
    pub format: String,
    pub truncate: usize,
    pub show_spans: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

impl LogConfig {
    /// Parsed level, `None` if the configured name is not a log level.
    pub fn level_filter(&self) -> Option<LevelFilter> {
        self.level.parse().ok()
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override (CLI flags end up here).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<RegramConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<RegramConfig, ConfigError> {
    Loader::new().build()
}
