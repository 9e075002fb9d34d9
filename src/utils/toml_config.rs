//! TOML-based configuration for Steward
//!
//! Server, storage, engine and notification settings plus seed workflow
//! definitions are read from a TOML file (`steward.toml`). Every section is
//! optional; an empty file yields a working in-memory setup.
//!
//! Use `StewardConfigManager` for thread-safe access to the current
//! configuration and for reloading it from disk. A reload only re-seeds
//! `[[workflows]]`; the other sections are read once when the server
//! starts.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::db::DatabaseProvider;
use crate::workflows::{EngineSettings, StepKind, WorkflowDefinition};

/// Root configuration structure loaded from steward.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StewardConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Workflow definitions registered at startup
    #[serde(default)]
    pub workflows: Vec<WorkflowDefinition>,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

// ============= Database Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Local database path, or `:memory:`
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Environment variable for Turso URL (optional cloud config)
    pub turso_url_env: Option<String>,

    /// Environment variable for Turso auth token
    pub turso_token_env: Option<String>,
}

fn default_database_url() -> String {
    "./data/steward.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            turso_url_env: None,
            turso_token_env: None,
        }
    }
}

// ============= Engine Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retries after a lost version race on votes, sweeps and cancels
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    /// Fail steps whose action type has no handler
    #[serde(default)]
    pub strict_actions: bool,

    /// Seconds between built-in expiry sweeps; 0 disables the sweeper
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_max_conflict_retries() -> u32 {
    5
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
            strict_actions: false,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

// ============= Notification Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Endpoint receiving notifications as JSON; logged only when unset
    pub webhook_url: Option<String>,

    #[serde(default = "default_notification_timeout")]
    pub timeout_ms: u64,
}

fn default_notification_timeout() -> u64 {
    5000
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_ms: default_notification_timeout(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub kind: ConfigWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    /// A step names an action type with no registered handler
    UnknownActionType,
    SweeperDisabled,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Workflow '{0}' is defined more than once")]
    DuplicateWorkflow(String),

    #[error("Workflow '{0}' is invalid: {1}")]
    InvalidWorkflow(String, String),
}

impl StewardConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: StewardConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref env) = self.database.turso_url_env {
            self.validate_env_var(env)?;
        }
        if let Some(ref env) = self.database.turso_token_env {
            self.validate_env_var(env)?;
        }

        if self.notifications.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "notifications.timeout_ms must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for workflow in &self.workflows {
            if !seen.insert(workflow.id.as_str()) {
                return Err(ConfigError::DuplicateWorkflow(workflow.id.clone()));
            }
            workflow
                .validate()
                .map_err(|e| ConfigError::InvalidWorkflow(workflow.id.clone(), e.to_string()))?;
        }

        Ok(())
    }

    /// Validate configuration with warnings for suspicious but legal settings
    ///
    /// `known_actions` are the action types with a registered handler.
    pub fn validate_with_warnings(
        &self,
        known_actions: &[String],
    ) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;

        let mut warnings = self.check_unknown_actions(known_actions);

        if self.engine.sweep_interval_secs == 0 {
            warnings.push(ConfigWarning {
                kind: ConfigWarningKind::SweeperDisabled,
                message: "Built-in expiry sweeper is disabled; approvals only expire via POST /api/sweep"
                    .to_string(),
            });
        }

        Ok(warnings)
    }

    fn check_unknown_actions(&self, known_actions: &[String]) -> Vec<ConfigWarning> {
        let severity = if self.engine.strict_actions {
            "will fail"
        } else {
            "will be skipped"
        };

        self.workflows
            .iter()
            .flat_map(|w| w.steps.iter().map(move |s| (w, s)))
            .filter_map(|(w, s)| match &s.kind {
                StepKind::Action { action_type, .. }
                    if !known_actions.iter().any(|k| k == action_type) =>
                {
                    Some(ConfigWarning {
                        kind: ConfigWarningKind::UnknownActionType,
                        message: format!(
                            "Step '{}' of workflow '{}' uses unknown action '{}' and {}",
                            s.id, w.id, action_type, severity
                        ),
                    })
                }
                _ => None,
            })
            .collect()
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Pick the storage backend: remote Turso when both env references are
    /// configured (and the `turso` feature is on), otherwise the local url
    pub fn database_provider(&self) -> Result<DatabaseProvider, ConfigError> {
        #[cfg(feature = "turso")]
        {
            if let (Some(url_env), Some(token_env)) =
                (&self.database.turso_url_env, &self.database.turso_token_env)
            {
                let url = self
                    .resolve_env(url_env)
                    .ok_or_else(|| ConfigError::MissingEnvVar(url_env.clone()))?;
                let auth_token = self
                    .resolve_env(token_env)
                    .ok_or_else(|| ConfigError::MissingEnvVar(token_env.clone()))?;
                return Ok(DatabaseProvider::Turso { url, auth_token });
            }
        }

        Ok(DatabaseProvider::from_url(&self.database.url))
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_conflict_retries: self.engine.max_conflict_retries,
            notification_timeout: self.notification_timeout(),
        }
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.notifications.timeout_ms)
    }

    pub fn get_workflow(&self, id: &str) -> Option<&WorkflowDefinition> {
        self.workflows.iter().find(|w| w.id == id)
    }

    /// Sections that differ from `newer` and only take effect after a restart
    pub fn restart_required_changes(&self, newer: &StewardConfig) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.server != newer.server {
            changed.push("server");
        }
        if self.database != newer.database {
            changed.push("database");
        }
        if self.engine != newer.engine {
            changed.push("engine");
        }
        if self.notifications != newer.notifications {
            changed.push("notifications");
        }
        changed
    }
}

// ============= Configuration Manager =============

/// Thread-safe configuration holder with lock-free reads and manual reload.
///
/// The running engine is built once from the startup configuration, so
/// `[server]`, `[database]`, `[engine]` and `[notifications]` changes picked
/// up by [`reload`](Self::reload) are logged and ignored until restart.
pub struct StewardConfigManager {
    config: Arc<ArcSwap<StewardConfig>>,
    config_path: Option<PathBuf>,
}

impl StewardConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = StewardConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: Some(path),
        })
    }

    /// Create a config manager directly from a config (useful for testing).
    /// Reloading is a no-op without a backing file.
    pub fn from_config(config: StewardConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: None,
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<StewardConfig> {
        self.config.load_full()
    }

    pub fn path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Reload the configuration from disk. On error the previous
    /// configuration stays in place.
    pub fn reload(&self) -> Result<Arc<StewardConfig>, ConfigError> {
        let Some(ref path) = self.config_path else {
            return Ok(self.config());
        };
        info!("Reloading configuration from {:?}", path);

        let new_config = Arc::new(StewardConfig::load(path)?);
        let previous = self.config.swap(Arc::clone(&new_config));

        let changed = previous.restart_required_changes(&new_config);
        if !changed.is_empty() {
            warn!(sections = ?changed, "Changed sections take effect after a restart; only workflows were reloaded");
        }

        info!("Configuration reloaded successfully");
        Ok(new_config)
    }
}

impl Clone for StewardConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
        }
    }
}
