use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::{error::EnrichError, provider::ProviderId};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const TIMEOUT_ENV: &str = "AEROINFO_TIMEOUT_SECS";

/// Settings for a single provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Overrides the vendor endpoint, e.g. a self-hosted elevation service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default bound for every provider call, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Example TOML:
    /// [providers.opencage]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Config {
    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    fn provider_config_mut(&mut self, id: ProviderId) -> &mut ProviderConfig {
        self.providers.entry(id.as_str().to_string()).or_default()
    }

    /// Load config from disk (empty if absent) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env(|name| std::env::var(name).ok())?;
        Ok(cfg)
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "aeroinfo", "aeroinfo")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay API keys and the global timeout from the environment.
    ///
    /// `lookup` stands in for `std::env::var` so tests don't touch the process env.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for &id in ProviderId::all() {
            let Some(var) = id.env_var() else { continue };
            if let Some(key) = lookup(var).filter(|k| !k.trim().is_empty()) {
                self.provider_config_mut(id).api_key = Some(key);
            }
        }

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .with_context(|| {
                    format!("{TIMEOUT_ENV} must be a whole number of seconds, got '{raw}'")
                })?;
            self.timeout_secs = Some(secs);
        }

        Ok(())
    }

    pub fn set_provider_api_key(&mut self, id: ProviderId, api_key: String) {
        self.provider_config_mut(id).api_key = Some(api_key);
    }

    pub fn set_provider_base_url(&mut self, id: ProviderId, base_url: String) {
        self.provider_config_mut(id).base_url = Some(base_url);
    }

    /// Returns API key for a provider, if present and non-blank.
    pub fn provider_api_key(&self, id: ProviderId) -> Option<&str> {
        self.provider_config(id)
            .and_then(|cfg| cfg.api_key.as_deref())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn is_provider_configured(&self, id: ProviderId) -> bool {
        !id.requires_api_key() || self.provider_api_key(id).is_some()
    }

    pub fn require_api_key(&self, id: ProviderId) -> Result<&str, EnrichError> {
        self.provider_api_key(id).ok_or_else(|| {
            let hint = match id.env_var() {
                Some(var) => format!("set {var} or run `aeroinfo configure {id}`"),
                None => format!("run `aeroinfo configure {id}`"),
            };
            EnrichError::configuration(format!(
                "No API key configured for provider '{id}'. Hint: {hint}."
            ))
        })
    }

    pub fn base_url(&self, id: ProviderId) -> String {
        self.provider_config(id)
            .and_then(|cfg| cfg.base_url.clone())
            .unwrap_or_else(|| id.default_base_url().to_string())
    }

    /// Per-provider timeout, falling back to the global one.
    pub fn timeout(&self, id: ProviderId) -> Duration {
        let secs = self
            .provider_config(id)
            .and_then(|cfg| cfg.timeout_secs)
            .or(self.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }
}
