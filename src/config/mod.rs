use crate::models::UserConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigError, Environment};
use std::fs;

/// Prefix for environment overrides, e.g. `ARCHIVE_TAGGER_CONCURRENCY=8`
pub const ENV_PREFIX: &str = "ARCHIVE_TAGGER";

/// File name of the user configuration inside the config directory
pub const USER_CONFIG_FILE: &str = "Archive Tagger.yaml";

/// Fallback directory when the platform has no config directory
const FALLBACK_CONFIG_DIR: &str = "Archive Tagger Data";

/// Configuration manager for loading and saving the YAML user configuration.
///
/// Settings are read from `Archive Tagger.yaml` in the config directory, then
/// `ARCHIVE_TAGGER_CONCURRENCY` and `ARCHIVE_TAGGER_DEBUG_MODE` from the
/// environment are applied on top. Only the file is ever written back.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing the configuration file
    ///
    /// # Returns
    /// A new ConfigManager instance
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            user_config_path: config_dir.join(USER_CONFIG_FILE),
            config_dir,
        })
    }

    /// Platform config directory (`~/.config/archive-tagger` on Linux)
    pub fn default_dir() -> Utf8PathBuf {
        dirs::config_dir()
            .and_then(|dir| Utf8PathBuf::try_from(dir).ok())
            .map(|dir| dir.join("archive-tagger"))
            .unwrap_or_else(|| Utf8PathBuf::from(FALLBACK_CONFIG_DIR))
    }

    /// Load the user configuration file with environment overrides.
    ///
    /// # Returns
    /// The loaded UserConfig, or default if file doesn't exist
    pub fn load_user_config(&self) -> Result<UserConfig> {
        self.load_user_config_with_env(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load the user configuration, applying overrides from `env`
    pub fn load_user_config_with_env(&self, env: Environment) -> Result<UserConfig> {
        let mut config = self.load_user_config_file()?;
        apply_env_overrides(&mut config, env)?;
        Ok(config)
    }

    fn load_user_config_file(&self) -> Result<UserConfig> {
        if !self.user_config_path.exists() {
            tracing::warn!(
                "User config file not found at {}, using defaults",
                self.user_config_path
            );
            return Ok(UserConfig::default());
        }

        let file_contents = fs::read_to_string(&self.user_config_path)
            .with_context(|| format!("Failed to read user config: {}", self.user_config_path))?;

        let mut config: UserConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse user config: {}", self.user_config_path))?;
        config.settings.extension_tags = config.settings.extension_tags.normalized();

        tracing::info!("Loaded user config from {}", self.user_config_path);
        Ok(config)
    }

    /// Save the user configuration file.
    ///
    /// # Arguments
    /// * `config` - The UserConfig to save
    pub fn save_user_config(&self, config: &UserConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize user config to YAML")?;

        fs::write(&self.user_config_path, yaml_string)
            .with_context(|| format!("Failed to write user config: {}", self.user_config_path))?;

        tracing::info!("Saved user config to {}", self.user_config_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the user configuration file path.
    pub fn user_config_path(&self) -> &Utf8Path {
        &self.user_config_path
    }
}

fn apply_env_overrides(config: &mut UserConfig, env: Environment) -> Result<()> {
    let overrides = Config::builder()
        .add_source(env)
        .build()
        .context("Failed to read environment overrides")?;

    if let Some(concurrency) = optional(overrides.get::<usize>("concurrency"))
        .context("Invalid concurrency override")?
    {
        config
            .settings
            .set_concurrency(concurrency)
            .context("Invalid concurrency override")?;
        tracing::debug!("Concurrency overridden from environment: {}", concurrency);
    }

    if let Some(debug_mode) =
        optional(overrides.get::<bool>("debug_mode")).context("Invalid debug mode override")?
    {
        config.settings.debug_mode = debug_mode;
    }

    Ok(())
}

fn optional<T>(value: Result<T, ConfigError>) -> Result<Option<T>, ConfigError> {
    match value {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
