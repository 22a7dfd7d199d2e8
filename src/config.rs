use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ConductorConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub identity: IdentityConfig,
    pub deploy: DeployConfig,
    pub hooks: HooksConfig,
    pub knowledge: KnowledgeConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Optional append-only log file, in addition to stderr.
    pub file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IdentityConfig {
    /// Name recorded on every session row started by this installation.
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeployConfig {
    /// Artifact location relative to the project directory.
    pub artifact_path: String,
    pub artifact_kind: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HooksConfig {
    pub callback_timeout_ms: u64,
    /// Callback names that are registered but never dispatched.
    pub disabled: Vec<String>,
    /// Open sessions of the same project older than this are closed as abandoned on start.
    pub stale_session_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Lookup endpoint. `None` disables the prompt lookup callback's network call.
    pub url: Option<String>,
    pub timeout_ms: u64,
    pub max_results: usize,
    pub min_similarity: f64,
    pub min_prompt_chars: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_conductor_dir()
            .join("conductor.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            artifact_path: ".claude/settings.local.json".into(),
            artifact_kind: "settings".into(),
        }
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            callback_timeout_ms: 5000,
            disabled: Vec::new(),
            stale_session_hours: 24,
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: 3000,
            max_results: 3,
            min_similarity: 0.45,
            min_prompt_chars: 12,
        }
    }
}

/// Returns `~/.conductor/`
pub fn default_conductor_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".conductor")
}

/// Returns the default config file path: `~/.conductor/config.toml`
pub fn default_config_path() -> PathBuf {
    default_conductor_dir().join("config.toml")
}

impl ConductorConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            ConductorConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (CONDUCTOR_DB, CONDUCTOR_LOG_LEVEL, CONDUCTOR_IDENTITY, CONDUCTOR_KNOWLEDGE_URL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CONDUCTOR_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("CONDUCTOR_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("CONDUCTOR_IDENTITY") {
            self.identity.name = val;
        }
        if let Ok(val) = std::env::var("CONDUCTOR_KNOWLEDGE_URL") {
            self.knowledge.url = Some(val);
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Where the artifact for a project rooted at `project_dir` lives.
    pub fn artifact_path_for(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.deploy.artifact_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
