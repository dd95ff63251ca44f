use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use motion_coach::models::{AnthropometricModel, DEFAULT_HEIGHT_M, DEFAULT_MASS_KG};
use motion_coach::EngineConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub body: BodyConfig,
}

/// The athlete's body, used for mass- and length-dependent quantities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyConfig {
    #[serde(default = "default_height")]
    pub height_m: f64,

    #[serde(default = "default_mass")]
    pub mass_kg: f64,
}

fn default_height() -> f64 {
    DEFAULT_HEIGHT_M
}

fn default_mass() -> f64 {
    DEFAULT_MASS_KG
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            height_m: default_height(),
            mass_kg: default_mass(),
        }
    }
}

impl Config {
    /// Get config directory path (~/.motion-coach/)
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".motion-coach"))
    }

    /// Get config file path (~/.motion-coach/config.toml)
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Resolve an explicit path or fall back to the default location
    pub fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::config_file(),
        }
    }

    /// Load configuration from file.
    ///
    /// A missing file yields the defaults with `MOTION_COACH_*` environment
    /// overrides applied to the engine section.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_file = Self::resolve_path(path)?;

        if !config_file.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self {
                engine: EngineConfig::from_env()?,
                body: BodyConfig::default(),
            });
        }

        let contents = fs::read_to_string(&config_file)
            .with_context(|| format!("Failed to read config file {}", config_file.display()))?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file, creating parent directories
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_file = Self::resolve_path(path)?;
        if let Some(parent) = config_file.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_file, contents).context("Failed to write config file")?;

        Ok(config_file)
    }

    /// Check the engine and body sections, reporting every out-of-range field
    pub fn validate(&self) -> Result<()> {
        self.engine.validate().context("Invalid [engine] section")?;
        self.body_model()?;
        Ok(())
    }

    pub fn body_model(&self) -> Result<AnthropometricModel> {
        AnthropometricModel::new(self.body.height_m, self.body.mass_kg).context("Invalid [body] section")
    }
}
