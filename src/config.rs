// ABOUTME: Configuration management for the SQL Steward CLI
// ABOUTME: Handles named MySQL connection profiles with extensible JSON format

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Config directory not found")]
    NoDirFound,
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),
}

/// Connection profile for a MySQL server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_port() -> u16 {
    3306
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            host: "localhost".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: String::new(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_active_profile")]
    pub active_profile: String,
    #[serde(default)]
    pub profiles: HashMap<String, ConnectionProfile>,
}

fn default_version() -> u32 {
    1
}

fn default_active_profile() -> String {
    "default".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert("default".to_string(), ConnectionProfile::default());

        Self {
            version: 1,
            active_profile: "default".to_string(),
            profiles,
        }
    }
}

impl AppConfig {
    /// Get the config file path based on OS
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoDirFound)?;
        let app_dir = config_dir.join("SQL Steward");
        Ok(app_dir.join("config.json"))
    }

    /// Load config from the default location, or create default if not exists
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;

        if !path.exists() {
            // Create default config
            let config = Self::default();
            config.save_to(&path)?;
            return Ok(config);
        }

        Self::load_from(&path)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the active connection profile
    pub fn active_profile(&self) -> Result<&ConnectionProfile, ConfigError> {
        self.profiles
            .get(&self.active_profile)
            .ok_or_else(|| ConfigError::ProfileNotFound(self.active_profile.clone()))
    }

    /// Get a profile by key
    pub fn profile(&self, key: &str) -> Result<&ConnectionProfile, ConfigError> {
        self.profiles
            .get(key)
            .ok_or_else(|| ConfigError::ProfileNotFound(key.to_string()))
    }

    /// Add or update a profile
    pub fn set_profile(&mut self, key: String, profile: ConnectionProfile) {
        self.profiles.insert(key, profile);
    }

    /// Remove a profile (cannot remove if it's the only one)
    pub fn remove_profile(&mut self, key: &str) -> Result<(), ConfigError> {
        if self.profiles.len() <= 1 {
            return Err(ConfigError::ProfileNotFound(
                "Cannot remove the last profile".to_string(),
            ));
        }
        self.profiles.remove(key);

        // If we removed the active profile, switch to another one
        if self.active_profile == key {
            if let Some(first_key) = self.profiles.keys().next() {
                self.active_profile = first_key.clone();
            }
        }
        Ok(())
    }
}
