mod defaults;
mod types;
mod validation;

pub use defaults::*;
pub use types::*;
pub use validation::*;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level ssh-unlock configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the private keys, `~/.ssh` when unset.
    pub key_dir: Option<PathBuf>,
    /// Overrides the system hostname for host matching.
    pub hostname: Option<String>,
    pub store: StoreConfig,
    pub tools: ToolsConfig,
    pub prompt: PromptConfig,
    /// Key registry: key file name to passphrase location and host.
    pub keys: BTreeMap<String, KeyEntryConfig>,
}

impl Config {
    /// Load configuration from file, environment, and defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(find_config_file);

        let mut config = match config_path {
            Some(config_path) if config_path.exists() || path.is_some() => {
                info!("Loading config from {}", config_path.display());
                load_config_file(&config_path)?
            }
            _ => {
                info!("No config file found, using defaults");
                Config::default()
            }
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Write a sample configuration to `path`, formatted by its extension.
    pub fn write_default(path: &str) -> Result<()> {
        let mut config = Config::default();
        config.keys.insert(
            "id_ed25519_work".to_string(),
            KeyEntryConfig {
                secret_path: "ssh/id_ed25519_work".to_string(),
                host: "workstation".to_string(),
            },
        );
        let rendered = match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::to_string_pretty(&config)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(&config)?,
            _ => serde_json::to_string_pretty(&config)?,
        };
        std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write config file '{path}'"))?;
        Ok(())
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(env) = var("SSH_UNLOCK_ENVIRONMENT") {
            self.store.environment = Some(env);
        }

        if let Some(program) = var("SSH_UNLOCK_STORE") {
            self.store.program = program;
        }

        if let Some(dir) = var("SSH_UNLOCK_KEY_DIR") {
            self.key_dir = Some(PathBuf::from(dir));
        }

        if let Some(hostname) = var("SSH_UNLOCK_HOSTNAME") {
            self.hostname = Some(hostname);
        }
    }

    /// Directory the configured keys live in.
    pub fn resolved_key_dir(&self) -> PathBuf {
        if let Some(dir) = &self.key_dir {
            return dir.clone();
        }
        dirs::home_dir()
            .map(|h| h.join(".ssh"))
            .unwrap_or_else(|| PathBuf::from(".ssh"))
    }
}

/// Find the configuration file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("ssh-unlock.toml"),
        PathBuf::from("ssh-unlock.json"),
        PathBuf::from("ssh-unlock.yaml"),
        PathBuf::from("ssh-unlock.yml"),
    ];

    for path in &candidates {
        if path.exists() {
            return Some(path.clone());
        }
    }

    // The historical location, next to the keys themselves.
    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".ssh").join(HOME_CONFIG_FILE);
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

/// Load configuration from a file path.
fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        _ => {
            // Try JSON5 first, then regular JSON
            json5::from_str(&content).or_else(|_| {
                serde_json::from_str(&content).map_err(|e| json5::Error::Message {
                    msg: e.to_string(),
                    location: None,
                })
            })?
        }
    };

    Ok(config)
}
