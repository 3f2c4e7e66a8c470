//! Configuration loading
//!
//! Resolution follows a fixed priority order:
//! 1. Explicit path (command-line `--config`)
//! 2. `SOURCER_CONFIG` environment variable
//! 3. Platform config file (`~/.config/mrp-sourcer/config.toml`, then `/etc/mrp-sourcer/config.toml`)
//! 4. Compiled defaults
//!
//! Database URLs may additionally be overridden per mode through
//! `SOURCER_DATABASE_URL_PRD` / `SOURCER_DATABASE_URL_QAS`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SOURCER_CONFIG";
/// Environment override for the production database URL
pub const PRD_URL_ENV_VAR: &str = "SOURCER_DATABASE_URL_PRD";
/// Environment override for the QAS database URL
pub const QAS_URL_ENV_VAR: &str = "SOURCER_DATABASE_URL_QAS";

/// Database target selected by `--mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Production database
    Prd,
    /// Quality-assurance database
    Qas,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Prd => write!(f, "prd"),
            Mode::Qas => write!(f, "qas"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prd" => Ok(Mode::Prd),
            "qas" => Ok(Mode::Qas),
            other => Err(Error::InvalidInput(format!(
                "Unknown mode '{}', expected 'prd' or 'qas'",
                other
            ))),
        }
    }
}

/// `[database]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub prd_url: String,
    pub qas_url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            prd_url: "sqlite://./data/sourcer_prd.db?mode=rwc".to_string(),
            qas_url: "sqlite://./data/sourcer_qas.db?mode=rwc".to_string(),
        }
    }
}

/// `[artifacts]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Root directory of the local artifact store
    pub root: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./artifacts"),
        }
    }
}

/// `[training]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Share of training rows held out for validation
    pub validation_fraction: f64,
    /// Seed of the train/validation split
    pub split_seed: u64,
    /// Folds used for hyperparameter selection
    pub cv_folds: usize,
    /// Seed of the fold assignment
    pub cv_seed: u64,
    /// Candidate smoothing values for the classifier
    pub smoothing_grid: Vec<f64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            validation_fraction: 0.1,
            split_seed: 597,
            cv_folds: 5,
            cv_seed: 42,
            smoothing_grid: vec![0.1, 0.5, 1.0, 2.0],
        }
    }
}

/// `[registry]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub accuracy_bottomline: f64,
    pub accuracy_target: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            accuracy_bottomline: 0.8,
            accuracy_target: 0.8,
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is unset
    pub level: String,
    /// Upload recent run logs into `log_message` after each stage
    pub upload_to_db: bool,
    /// Age limit of uploaded log records
    pub upload_window_minutes: i64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            upload_to_db: true,
            upload_window_minutes: 15,
        }
    }
}

/// Complete pipeline configuration, passed explicitly into every stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub database: DatabaseConfig,
    pub artifacts: ArtifactConfig,
    pub training: TrainingConfig,
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Load configuration following the documented priority order
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(cli_path)? {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Read {} failed: {}", path.display(), e))
                })?;
                Self::from_toml_str(&content)?
            }
            None => {
                warn!("No configuration file found, using compiled defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing sections fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Database URL for the selected mode
    pub fn database_url(&self, mode: Mode) -> &str {
        match mode {
            Mode::Prd => &self.database.prd_url,
            Mode::Qas => &self.database.qas_url,
        }
    }

    /// Replace database URLs from the environment when set
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_env(PRD_URL_ENV_VAR) {
            self.database.prd_url = url;
        }
        if let Some(url) = non_empty_env(QAS_URL_ENV_VAR) {
            self.database.qas_url = url;
        }
    }

    /// Reject values the stages cannot work with
    pub fn validate(&self) -> Result<()> {
        let training = &self.training;
        if !(training.validation_fraction > 0.0 && training.validation_fraction < 1.0) {
            return Err(Error::Config(format!(
                "training.validation_fraction must be in (0, 1), got {}",
                training.validation_fraction
            )));
        }
        if training.cv_folds < 2 {
            return Err(Error::Config(format!(
                "training.cv_folds must be at least 2, got {}",
                training.cv_folds
            )));
        }
        if training.smoothing_grid.is_empty() || training.smoothing_grid.iter().any(|a| *a <= 0.0) {
            return Err(Error::Config(
                "training.smoothing_grid must contain positive values".to_string(),
            ));
        }
        if self.logging.upload_window_minutes <= 0 {
            return Err(Error::Config(
                "logging.upload_window_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Find the configuration file to read, if any
///
/// Explicit locations (CLI, environment) must exist; platform locations are optional.
fn resolve_config_path(cli_path: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = cli_path {
        return require_existing(path.to_path_buf());
    }

    if let Some(path) = non_empty_env(CONFIG_ENV_VAR) {
        return require_existing(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("mrp-sourcer").join("config.toml"));
    let system_config = PathBuf::from("/etc/mrp-sourcer/config.toml");

    Ok(user_config
        .into_iter()
        .chain(std::iter::once(system_config))
        .find(|p| p.exists()))
}

fn require_existing(path: PathBuf) -> Result<Option<PathBuf>> {
    if path.exists() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!("Config file not found: {}", path.display())))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
