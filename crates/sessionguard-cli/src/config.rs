//! Application configuration management.
//!
//! This module handles loading and saving the CLI configuration, which
//! includes an optional API base URL override, the last used email, the
//! idle timeout, and where the access credential is kept.
//!
//! Configuration is stored at `~/.config/sessionguard/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sessionguard_core::config::ENV_API_BASE_URL;
use sessionguard_core::{ClientConfig, CredentialStore, FileSlot, KeyringSlot};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "sessionguard";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Where the access credential is persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub last_email: Option<String>,
    pub idle_timeout_minutes: Option<u64>,
    #[serde(default)]
    pub credential_backend: CredentialBackend,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Client settings: environment first, then this file, then defaults.
    pub fn client_config(&self) -> ClientConfig {
        let env_has_url = std::env::var(ENV_API_BASE_URL).is_ok();
        self.apply(ClientConfig::from_env(), env_has_url)
    }

    fn apply(&self, mut client: ClientConfig, env_has_url: bool) -> ClientConfig {
        if !env_has_url {
            if let Some(ref url) = self.api_base_url {
                client.base_url = url.clone();
            }
        }
        if let Some(minutes) = self.idle_timeout_minutes.filter(|m| *m > 0) {
            client.idle_timeout = Duration::from_secs(minutes * 60);
        }
        client
    }

    pub fn credential_store(&self) -> Result<CredentialStore> {
        Ok(match self.credential_backend {
            CredentialBackend::File => CredentialStore::new(FileSlot::new(self.cache_dir()?)),
            CredentialBackend::Keyring => CredentialStore::new(KeyringSlot::new()?),
            CredentialBackend::Memory => CredentialStore::in_memory(),
        })
    }
}
