//! Configuration loading and output directory resolution
//!
//! Values are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file never aborts startup; the service logs a
//! warning and continues with compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the model output directory
pub const OUTPUT_DIR_ENV: &str = "MINIVGG_OUTPUT_DIR";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "MINIVGG_CONFIG";

/// Port used when neither CLI, environment nor TOML provide one
pub const DEFAULT_PORT: u16 = 5780;

/// Largest accepted `training.image_size`
pub const MAX_IMAGE_SIZE: usize = 4096;

/// Compiled-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub output_dir: PathBuf,
    pub port: u16,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let output_dir = if cfg!(target_os = "linux") {
            // ~/.local/share/minivgg/models (or /var/lib/minivgg/models)
            dirs::data_local_dir()
                .map(|d| d.join("minivgg").join("models"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/minivgg/models"))
        } else if cfg!(target_os = "macos") {
            // ~/Library/Application Support/minivgg/models
            dirs::data_dir()
                .map(|d| d.join("minivgg").join("models"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/minivgg/models"))
        } else if cfg!(target_os = "windows") {
            // %LOCALAPPDATA%\minivgg\models
            dirs::data_local_dir()
                .map(|d| d.join("minivgg").join("models"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\minivgg\\models"))
        } else {
            PathBuf::from("./minivgg_models")
        };

        Self {
            output_dir,
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[training]` section: hyperparameters and split policy for every job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// Square input size every image is resized to
    pub image_size: usize,
    /// 3 for RGB, 1 for grayscale
    pub channels: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Filters in the first convolution block (doubled in the second)
    pub base_filters: usize,
    /// Width of the fully connected layer
    pub dense_units: usize,
    /// Fraction held out for evaluation when trainOnly is false
    pub test_fraction: f64,
    /// Keep per-class proportions in the held-out split
    pub stratified: bool,
    /// Seed for the split, epoch shuffling and weight init
    pub seed: u64,
    /// Ignore `seed` and draw a fresh one per job
    pub random_seed: bool,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            image_size: 256,
            channels: 3,
            epochs: 10,
            batch_size: 32,
            learning_rate: 0.01,
            base_filters: 32,
            dense_units: 512,
            test_fraction: 0.25,
            stratified: false,
            seed: 42,
            random_seed: false,
        }
    }
}

impl TrainingSettings {
    /// Reject settings the model or split policy cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.image_size < 4 || self.image_size % 4 != 0 {
            return Err(Error::Config(format!(
                "training.image_size must be a positive multiple of 4, got {}",
                self.image_size
            )));
        }
        if self.image_size > MAX_IMAGE_SIZE {
            return Err(Error::Config(format!(
                "training.image_size must be at most {}, got {}",
                MAX_IMAGE_SIZE, self.image_size
            )));
        }
        if self.channels != 1 && self.channels != 3 {
            return Err(Error::Config(format!(
                "training.channels must be 1 or 3, got {}",
                self.channels
            )));
        }
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(Error::Config(
                "training.epochs and training.batch_size must be greater than 0".to_string(),
            ));
        }
        if self.base_filters == 0 || self.dense_units == 0 {
            return Err(Error::Config(
                "training.base_filters and training.dense_units must be greater than 0"
                    .to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(Error::Config(format!(
                "training.learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(Error::Config(format!(
                "training.test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        Ok(())
    }
}

/// Contents of `minivgg-train.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Directory persisted models are written to
    pub output_dir: Option<PathBuf>,
    pub port: Option<u16>,
    pub logging: LoggingConfig,
    pub training: TrainingSettings,
}

/// Default config file location for the platform
///
/// `MINIVGG_CONFIG` overrides the lookup entirely.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("minivgg").join("minivgg-train.toml"));
    if let Some(path) = &user_config {
        if path.exists() {
            return user_config;
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/minivgg/minivgg-train.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;
    config.training.validate()?;
    Ok(config)
}

/// Load the TOML config, falling back to defaults when absent
///
/// A file that exists but fails to parse or validate is an error.
pub fn load_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    match path {
        Some(path) if path.exists() => {
            let config = load_toml_config(path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Some(path) => {
            warn!(
                "Config file not found at {}, using compiled defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            info!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Resolves the directory trained models are persisted to
pub struct OutputDirResolver {
    cli_arg: Option<PathBuf>,
}

impl OutputDirResolver {
    pub fn new(cli_arg: Option<PathBuf>) -> Self {
        Self { cli_arg }
    }

    pub fn resolve(&self, toml_config: &TomlConfig) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(OUTPUT_DIR_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &toml_config.output_dir {
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().output_dir
    }
}

/// Resolve the listening port (CLI/env are merged by clap upstream)
pub fn resolve_port(cli_or_env: Option<u16>, toml_config: &TomlConfig) -> u16 {
    cli_or_env
        .or(toml_config.port)
        .unwrap_or(CompiledDefaults::for_current_platform().port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_training_settings_are_valid() {
        let settings = TrainingSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.image_size, 256);
        assert_eq!(settings.channels, 3);
        assert_eq!(settings.test_fraction, 0.25);
        assert_eq!(settings.seed, 42);
    }

    #[test]
    fn image_size_has_an_upper_bound() {
        let at_limit = TrainingSettings {
            image_size: MAX_IMAGE_SIZE,
            ..TrainingSettings::default()
        };
        assert!(at_limit.validate().is_ok());

        let oversized = TrainingSettings {
            image_size: (u32::MAX as usize) + 5,
            ..TrainingSettings::default()
        };
        assert!(matches!(oversized.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn image_size_must_be_multiple_of_four() {
        let settings = TrainingSettings {
            image_size: 30,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_fraction_bounds_are_exclusive() {
        for fraction in [0.0, 1.0, -0.5, 1.5] {
            let settings = TrainingSettings {
                test_fraction: fraction,
                ..Default::default()
            };
            assert!(settings.validate().is_err(), "fraction {fraction} accepted");
        }
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            output_dir = "/srv/models"

            [training]
            epochs = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.output_dir, Some(PathBuf::from("/srv/models")));
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.training.batch_size, 32);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.port, None);
    }

    #[test]
    fn port_falls_back_to_toml_then_default() {
        let mut config = TomlConfig::default();
        assert_eq!(resolve_port(None, &config), DEFAULT_PORT);

        config.port = Some(6000);
        assert_eq!(resolve_port(None, &config), 6000);
        assert_eq!(resolve_port(Some(7000), &config), 7000);
    }
}
