//! Configuration management for agent.toml
//!
//! All settings are resolved once at startup into an explicit [`Config`]
//! that is passed into each component constructor. Secrets come from the
//! environment and override anything found in agent.toml.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_anthropic_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub computer_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    #[serde(default = "default_vault_root")]
    pub root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_lock_wait")]
    pub lock_wait_secs: u64,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_anthropic_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_remote_url() -> String {
    "https://www.orgo.ai/api".to_string()
}

fn default_vault_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vault")
}

fn default_lock_path() -> PathBuf {
    PathBuf::from("/tmp/vault_agent_task.lock")
}

fn default_poll_interval() -> u64 {
    60
}

fn default_lock_wait() -> u64 {
    30
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            base_url: default_anthropic_url(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_remote_url(),
            api_key: String::new(),
            computer_id: String::new(),
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: default_vault_root(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            lock_path: default_lock_path(),
            poll_interval_secs: default_poll_interval(),
            lock_wait_secs: default_lock_wait(),
        }
    }
}

impl Config {
    /// Load configuration: agent.toml if present, then environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_path() {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path (no environment overrides).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.as_ref().display()))
    }

    /// Find agent.toml by searching current directory and parents.
    pub fn find_config_path() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        for _ in 0..10 {
            let candidate = current.join("agent.toml");
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Overlay secrets and paths from the process environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            if !key.is_empty() {
                self.anthropic.api_key = key;
            }
        }
        if let Ok(key) = std::env::var("REMOTE_API_KEY") {
            if !key.is_empty() {
                self.remote.api_key = key;
            }
        }
        if let Ok(id) = std::env::var("REMOTE_COMPUTER_ID") {
            if !id.is_empty() {
                self.remote.computer_id = id;
            }
        }
        if let Ok(root) = std::env::var("VAULT_PATH") {
            if !root.is_empty() {
                self.vault.root = PathBuf::from(root);
            }
        }
    }

    /// Whether full-capability (remote desktop) execution is configured.
    pub fn remote_configured(&self) -> bool {
        !self.remote.api_key.is_empty() && !self.remote.computer_id.is_empty()
    }
}

impl VaultConfig {
    pub fn tasks_file(&self) -> PathBuf {
        self.root.join("tasks.md")
    }

    pub fn completed_dir(&self) -> PathBuf {
        self.root.join("completed_tasks")
    }

    pub fn context_dir(&self) -> PathBuf {
        self.root.join("context")
    }

    pub fn daily_dir(&self) -> PathBuf {
        self.root.join("Daily")
    }

    pub fn guidance_file(&self) -> PathBuf {
        self.root.join("AGENT.md")
    }
}
