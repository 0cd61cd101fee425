//! Configuration parsing and validation.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::{AppError, Result};

fn default_env_var() -> String {
    "ATERM".into()
}

fn default_driver() -> Vec<String> {
    vec!["aterm-shell".into()]
}

fn default_log_level() -> String {
    "info".into()
}

/// Configuration parsed from `config.toml`. Every field has a default, so an
/// empty file is valid.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Local socket name. When unset the host generates a unique one.
    #[serde(default)]
    pub socket_name: Option<String>,
    /// Environment variable that carries the socket name to the driver.
    #[serde(default = "default_env_var")]
    pub env_var: String,
    /// Driver command spawned when none is given on the command line.
    #[serde(default = "default_driver")]
    pub driver: Vec<String>,
    /// Tracing filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_name: None,
            env_var: default_env_var(),
            driver: default_driver(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use the defaults.
    ///
    /// # Errors
    ///
    /// Same as [`load_from_path`](Self::load_from_path).
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.env_var.is_empty() || self.env_var.contains(['=', '\0']) {
            return Err(AppError::Config(
                "env_var must be a non-empty name without '=' or NUL".into(),
            ));
        }

        if self.driver.first().map_or(true, String::is_empty) {
            return Err(AppError::Config("driver must name a command".into()));
        }

        if self.socket_name.as_deref().is_some_and(str::is_empty) {
            return Err(AppError::Config("socket_name must not be empty".into()));
        }

        Ok(())
    }
}
