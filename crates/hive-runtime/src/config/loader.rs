//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: `hive.toml` and `config.toml`
//! - `yaml-config`: `hive.yaml`, `hive.yml`, `config.yaml` and `config.yml`
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`hive.{profile}.toml`)
//! 3. Main config file (`hive.toml`)
//! 4. Environment variables (`HIVE_*`)
//! 5. Programmatic overrides
//!
//! Environment variables use `__` as the nesting separator, so
//! `HIVE_LOGGING__LEVEL=debug` sets `logging.level` and
//! `HIVE_LOGS__CAPACITY=50` sets `logs.capacity`.
//!
//! # Example
//!
//! ```rust,ignore
//! use hive_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./hive.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::{Figment, Provider};
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::HiveConfig;

/// Environment variable selecting the profile.
const PROFILE_VAR: &str = "HIVE_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads `HIVE_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }

    fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
///
/// The loader is `Clone` so a runtime can keep one around and re-read the
/// same sources on reload.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Programmatic overrides.
    figment: Figment,
    profile: Profile,
    /// Directories searched when no explicit file is set.
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Explicit file, overrides the search.
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.search_path(cwd)
        } else {
            self
        }
    }

    /// Adds `<config dir>/hive` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.search_path(config_dir.join("hive"))
        } else {
            self
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a provider on top of every other source.
    ///
    /// ```rust,ignore
    /// use figment::providers::Serialized;
    ///
    /// let config = ConfigLoader::new()
    ///     .merge(Serialized::default("logging.level", "debug"))
    ///     .load()?;
    /// ```
    pub fn merge(mut self, provider: impl Provider) -> Self {
        self.figment = self.figment.merge(provider);
        self
    }

    /// Loads and returns the configuration.
    pub fn load(&self) -> ConfigResult<HiveConfig> {
        let figment = self.build_figment()?;

        let config: HiveConfig = figment.extract().map_err(|e| {
            ConfigError::ParseError(format!("Failed to extract configuration: {e}"))
        })?;

        debug!(
            profile = %self.profile,
            logging_level = %config.logging.level,
            bees = config.bees.len(),
            actions = config.actions.len(),
            chains = config.chains.len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(HiveConfig::default()));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with HIVE_ prefix");
            figment = figment.merge(Env::prefixed("HIVE_").ignore(&["PROFILE"]).split("__"));
        }

        Ok(figment.merge(self.figment.clone()))
    }

    /// Merges a single file, dispatching on its extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("hive"));
        }
        paths
    }

    /// Tries `search_paths × base_names`, merging the profile variant of a
    /// name before the name itself. Stops at the first base file found.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return (merge_fn(figment, &base_path), true);
                }
            }
        }
        (figment, false)
    }

    #[allow(unused_mut)]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["hive.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["hive.yaml", "hive.yml", "config.yaml", "config.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!(paths = ?search_paths, "No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<HiveConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from `path`, plus environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<HiveConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogLevel, LogOutput};
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let temp = TempDir::new().unwrap();
        let config = ConfigLoader::new()
            .search_path(temp.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level.as_str(), "info");
        assert_eq!(config.logs.capacity, hive_core::DEFAULT_LOG_CAPACITY);
        assert!(config.bees.is_empty());
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("DEV"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::new()
            .file("/definitely/not/here/hive.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "hive.ini", "");
        let result = ConfigLoader::new().file(path).without_env().load();
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_load_manifest_from_toml() {
        let temp = TempDir::new().unwrap();
        let path = write(
            temp.path(),
            "hive.toml",
            r#"
[logging]
level = "debug"
output = "stderr"

[logs]
capacity = 50

[[bees]]
name = "ticker"
class = "ticker"
options = [{ name = "interval", value = 5 }]

[[actions]]
id = "say-hi"
bee = "echo"
name = "say"
options = [{ name = "text", type = "string", value = "tick {{.count}}" }]

[[chains]]
name = "echo-ticks"
event = { bee = "ticker", name = "tick" }
filters = ["{{test gt .count 0}}"]
actions = ["say-hi"]
"#,
        );

        let config = ConfigLoader::new().file(path).without_env().load().unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.output, LogOutput::Stderr);
        assert_eq!(config.logs.capacity, 50);
        assert_eq!(config.bees[0].name, "ticker");
        assert_eq!(config.bees[0].options.bind::<i64>("interval").ok(), Some(5));
        assert_eq!(config.actions[0].id, "say-hi");
        assert_eq!(config.chains[0].event.bee, "ticker");
        assert_eq!(config.chains[0].actions, vec!["say-hi"]);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_and_search() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "hive.toml", "[logs]\ncapacity = 10\n");
        write(
            temp.path(),
            "hive.production.toml",
            "[logging]\nlevel = \"warn\"\n[logs]\ncapacity = 99\n",
        );

        let config = ConfigLoader::new()
            .profile("production")
            .search_path(temp.path())
            .without_env()
            .load()
            .unwrap();
        assert_eq!(config.logging.level, LogLevel::Warn);
        // The base file is merged last and wins.
        assert_eq!(config.logs.capacity, 10);
    }

    #[test]
    fn test_programmatic_merge_wins() {
        let temp = TempDir::new().unwrap();
        let config = ConfigLoader::new()
            .search_path(temp.path())
            .without_env()
            .merge(Serialized::default("logs.capacity", 7))
            .load()
            .unwrap();
        assert_eq!(config.logs.capacity, 7);
    }
}
