//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The store location comes from ACCOUNT_STORE_PATH, then `store.path`, then
//! the per-user default under the home directory.

use account_rotation::{FallbackCredential, RotationConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file used when neither `--config` nor CONFIG_PATH is given.
pub const DEFAULT_CONFIG_FILE: &str = "account-rotation.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub rotation: RotationSettings,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// Account store location
#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Rotation windows, in seconds
#[derive(Debug, Deserialize)]
pub struct RotationSettings {
    #[serde(default = "default_rate_limit_secs")]
    pub rate_limit_secs: u64,
    #[serde(default = "default_auth_failure_cooldown_secs")]
    pub auth_failure_cooldown_secs: u64,
    #[serde(default = "default_network_error_cooldown_secs")]
    pub network_error_cooldown_secs: u64,
}

/// Credential used to seed an empty store
#[derive(Debug, Default, Deserialize)]
pub struct FallbackConfig {
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
}

fn default_rate_limit_secs() -> u64 {
    60
}

fn default_auth_failure_cooldown_secs() -> u64 {
    300
}

fn default_network_error_cooldown_secs() -> u64 {
    30
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            rate_limit_secs: default_rate_limit_secs(),
            auth_failure_cooldown_secs: default_auth_failure_cooldown_secs(),
            network_error_cooldown_secs: default_network_error_cooldown_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_optional(path: &Path) -> common::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Config::default().finish()
        }
    }

    /// Validate and apply environment overrides.
    fn finish(mut self) -> common::Result<Self> {
        let rotation = &self.rotation;
        for (name, value) in [
            ("rate_limit_secs", rotation.rate_limit_secs),
            ("auth_failure_cooldown_secs", rotation.auth_failure_cooldown_secs),
            ("network_error_cooldown_secs", rotation.network_error_cooldown_secs),
        ] {
            if value == 0 {
                return Err(common::Error::Config(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if let Ok(path) = std::env::var("ACCOUNT_STORE_PATH") {
            let path = path.trim();
            if !path.is_empty() {
                self.store.path = Some(PathBuf::from(path));
            }
        }

        Ok(self)
    }

    /// Config path given explicitly via CLI arg or CONFIG_PATH env var.
    pub fn explicit_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        std::env::var("CONFIG_PATH").ok().map(PathBuf::from)
    }

    /// Where the account document lives.
    pub fn store_path(&self) -> common::Result<PathBuf> {
        match &self.store.path {
            Some(path) => Ok(path.clone()),
            None => account_store::default_path().ok_or_else(|| {
                common::Error::Config(
                    "no home directory found; set store.path or ACCOUNT_STORE_PATH".into(),
                )
            }),
        }
    }

    pub fn rotation_config(&self) -> RotationConfig {
        RotationConfig {
            rate_limit: Duration::from_secs(self.rotation.rate_limit_secs),
            auth_failure_cooldown: Duration::from_secs(self.rotation.auth_failure_cooldown_secs),
            network_error_cooldown: Duration::from_secs(self.rotation.network_error_cooldown_secs),
        }
    }

    /// Read the fallback credential file, if one is configured.
    pub fn fallback_credential(&self) -> common::Result<Option<FallbackCredential>> {
        match &self.fallback.credentials_file {
            Some(path) => FallbackCredential::from_file(path)
                .map(Some)
                .map_err(|e| {
                    common::Error::Config(format!(
                        "failed to read fallback credentials_file {}: {e}",
                        path.display()
                    ))
                }),
            None => Ok(None),
        }
    }
}
