//! Application configuration.
//!
//! Settings are layered: built-in defaults, then an optional
//! `settings.json` under the user's config directory, then `GTANEXT_*`
//! environment variables. The resulting [`AppConfig`] is built once at
//! startup and handed to everything that touches disk.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Directory name used under the platform config/data roots.
pub const APP_DIR: &str = "gtanext";
/// Settings file name inside the config directory.
pub const SETTINGS_FILE: &str = "settings.json";
/// Default registry document file name.
pub const REGISTRY_FILE: &str = "games.json";
/// Default metadata document file name.
pub const METADATA_FILE: &str = "config.json";
/// Default loader package directory name.
pub const MODULE_DIR: &str = "modules";
/// Environment variable prefix, also used to override the settings path.
pub const ENV_PREFIX: &str = "GTANEXT";

/// Runtime configuration shared by the registry and the front-ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root for persisted documents.
    pub data_dir: PathBuf,
    /// Registry document; defaults to `data_dir/games.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_file: Option<PathBuf>,
    /// Metadata document; defaults to `data_dir/config.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_file: Option<PathBuf>,
    /// Where log files are written.
    pub log_dir: PathBuf,
    /// Bundled loader packages; defaults to `data_dir/modules`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_dir: Option<PathBuf>,
    /// Refuse to start when a runtime prerequisite is missing.
    #[serde(default = "default_check_environment")]
    pub check_environment: bool,
}

fn default_check_environment() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        Self::for_data_dir(data_dir)
    }
}

impl AppConfig {
    /// Configuration rooted at `data_dir` with every other value defaulted.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            log_dir: data_dir.join("logs"),
            data_dir,
            registry_file: None,
            metadata_file: None,
            module_dir: None,
            check_environment: true,
        }
    }

    /// Load from the default settings path.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from `path`, which may be absent.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let defaults = Self::default();
        let settings = Config::builder()
            .set_default("data_dir", path_value(&defaults.data_dir))?
            .set_default("check_environment", defaults.check_environment)?
            .add_source(File::from(path).format(FileFormat::Json).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .with_context(|| format!("failed to read settings {}", path.display()))?;

        let mut config: RawConfig = settings
            .try_deserialize()
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        let log_dir = config
            .log_dir
            .take()
            .unwrap_or_else(|| config.data_dir.join("logs"));
        Ok(Self {
            data_dir: config.data_dir,
            registry_file: config.registry_file,
            metadata_file: config.metadata_file,
            log_dir,
            module_dir: config.module_dir,
            check_environment: config.check_environment,
        })
    }

    /// Resolved registry document path.
    pub fn registry_path(&self) -> PathBuf {
        self.resolve(self.registry_file.as_deref(), REGISTRY_FILE)
    }

    /// Resolved metadata document path.
    pub fn metadata_path(&self) -> PathBuf {
        self.resolve(self.metadata_file.as_deref(), METADATA_FILE)
    }

    /// Resolved loader package directory.
    pub fn module_path(&self) -> PathBuf {
        self.resolve(self.module_dir.as_deref(), MODULE_DIR)
    }

    /// Write this configuration to `path` as indented JSON.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let serialized =
            serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        fs::write(path, serialized).with_context(|| format!("failed to write {}", path.display()))
    }

    fn resolve(&self, configured: Option<&Path>, file_name: &str) -> PathBuf {
        match configured {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.data_dir.join(path),
            None => self.data_dir.join(file_name),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    data_dir: PathBuf,
    #[serde(default)]
    registry_file: Option<PathBuf>,
    #[serde(default)]
    metadata_file: Option<PathBuf>,
    #[serde(default)]
    log_dir: Option<PathBuf>,
    #[serde(default)]
    module_dir: Option<PathBuf>,
    #[serde(default = "default_check_environment")]
    check_environment: bool,
}

/// Settings path, honouring `GTANEXT_CONFIG` when set.
pub fn default_config_path() -> PathBuf {
    if let Some(path) = env::var_os(format!("{ENV_PREFIX}_CONFIG")) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(SETTINGS_FILE)
}

/// Create the default settings file if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = default_config_path();
    ensure_config_at(&path)?;
    Ok(path)
}

/// Create default settings at `path` if it is missing.
pub fn ensure_config_at(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    info!(path = %path.display(), "writing default settings");
    AppConfig::default().persist(path)
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::tempdir;

    // Loading reads process-wide environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_guard() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn missing_file_uses_defaults() -> Result<()> {
        let _guard = env_guard();
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.json"))?;
        assert!(config.data_dir.ends_with(APP_DIR));
        assert!(config.check_environment);
        assert_eq!(config.registry_path(), config.data_dir.join(REGISTRY_FILE));
        assert_eq!(config.log_dir, config.data_dir.join("logs"));
        assert_eq!(config.module_path(), config.data_dir.join(MODULE_DIR));
        Ok(())
    }

    #[test]
    fn settings_file_overrides_defaults() -> Result<()> {
        let _guard = env_guard();
        let dir = tempdir()?;
        let data_dir = dir.path().join("data");
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(
            &path,
            serde_json::to_string(&serde_json::json!({
                "data_dir": data_dir,
                "registry_file": "library.json",
                "check_environment": false
            }))?,
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.data_dir, data_dir);
        assert_eq!(config.registry_path(), data_dir.join("library.json"));
        assert_eq!(config.metadata_path(), data_dir.join(METADATA_FILE));
        assert!(!config.check_environment);
        Ok(())
    }

    #[test]
    fn ensure_config_writes_once() -> Result<()> {
        let _guard = env_guard();
        let dir = tempdir()?;
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        ensure_config_at(&path)?;
        assert!(path.exists());

        let mut custom = AppConfig::for_data_dir(dir.path());
        custom.check_environment = false;
        custom.persist(&path)?;
        ensure_config_at(&path)?;
        let reloaded = AppConfig::load_from(&path)?;
        assert!(!reloaded.check_environment);
        Ok(())
    }

    #[test]
    fn environment_overrides_settings_file() -> Result<()> {
        let _guard = env_guard();
        let dir = tempdir()?;
        let file_dir = dir.path().join("from-file");
        let env_dir = dir.path().join("from-env");
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(
            &path,
            serde_json::to_string(&serde_json::json!({
                "data_dir": file_dir,
                "check_environment": true
            }))?,
        )?;

        env::set_var("GTANEXT_DATA_DIR", &env_dir);
        env::set_var("GTANEXT_CHECK_ENVIRONMENT", "false");
        let loaded = AppConfig::load_from(&path);
        env::remove_var("GTANEXT_DATA_DIR");
        env::remove_var("GTANEXT_CHECK_ENVIRONMENT");

        let config = loaded?;
        assert_eq!(config.data_dir, env_dir);
        assert_eq!(config.registry_path(), env_dir.join(REGISTRY_FILE));
        assert_eq!(config.log_dir, env_dir.join("logs"));
        assert!(!config.check_environment);
        Ok(())
    }
}
