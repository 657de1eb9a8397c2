//! Configuration loading, validation, and management for murmur.
//!
//! Loads configuration from `~/.murmur/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.murmur/config.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Model service configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Agent loop budgets and messages
    #[serde(default)]
    pub agent: AgentConfig,

    /// Background scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Standing periodic tasks loaded at startup
    #[serde(default)]
    pub routines: Vec<RoutineConfig>,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model", &self.model)
            .field("agent", &self.agent)
            .field("scheduler", &self.scheduler)
            .field("routines", &self.routines)
            .finish()
    }
}

/// Model service settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Which backend to use: "openai", "openrouter", "ollama", or "custom"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL override (required when provider = "custom")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// API key (environment variables take priority)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name sent to the backend
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            api_key: None,
            model: default_model(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Agent loop budgets.
///
/// Immediate replies and background tasks get distinct step budgets: a task
/// run is not latency-sensitive, so it can afford more tool round-trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// How many recent messages the prompt builder includes
    #[serde(default = "default_history_limit")]
    pub conversation_history_limit: usize,

    /// Step budget for immediate replies
    #[serde(default = "default_reply_max_steps")]
    pub reply_max_steps: u32,

    /// Step budget for background task runs
    #[serde(default = "default_task_max_steps")]
    pub task_max_steps: u32,

    /// Overall wall-clock budget per run, independent of step count
    #[serde(default = "default_run_deadline")]
    pub run_deadline_secs: u64,

    /// User-facing text returned when the step budget runs out
    #[serde(default = "default_exhausted_message")]
    pub exhausted_message: String,
}

fn default_history_limit() -> usize {
    20
}
fn default_reply_max_steps() -> u32 {
    6
}
fn default_task_max_steps() -> u32 {
    24
}
fn default_run_deadline() -> u64 {
    120
}
fn default_exhausted_message() -> String {
    "I ran out of working steps before finishing this. Here is what I have so far — \
     ask again if you'd like me to keep going."
        .into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            conversation_history_limit: default_history_limit(),
            reply_max_steps: default_reply_max_steps(),
            task_max_steps: default_task_max_steps(),
            run_deadline_secs: default_run_deadline(),
            exhausted_message: default_exhausted_message(),
        }
    }
}

/// Background scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the scheduler polls queued tasks, in seconds
    #[serde(default = "default_check_interval")]
    pub task_check_interval_secs: u64,

    /// The schedule policy attached to tasks created by classification
    #[serde(default)]
    pub default_policy: PolicyConfig,
}

fn default_check_interval() -> u64 {
    5
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            task_check_interval_secs: default_check_interval(),
            default_policy: PolicyConfig::default(),
        }
    }
}

/// A schedule policy described in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Fire once the conversation has been idle this long
    Idle { idle_timeout_secs: u64 },

    /// Fire on idle, or unconditionally once the fallback elapses —
    /// the starvation guard for chatty conversations
    TwoPhase {
        idle_timeout_secs: u64,
        fallback_timeout_secs: u64,
    },

    /// Fire a fixed delay after the task is created, idle or not
    Delayed { delay_secs: u64 },

    /// Fire every interval; the task is never removed
    Periodic { interval_secs: u64 },
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::TwoPhase {
            idle_timeout_secs: 300,
            fallback_timeout_secs: 3600,
        }
    }
}

/// A standing task loaded from config at startup (e.g. a daily reminder).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineConfig {
    /// Routine name (used as the task id)
    pub name: String,

    /// The conversation this routine posts into
    pub owner: String,

    /// The goal text handed to the controller when the routine fires
    pub goal: String,

    /// Firing interval in seconds
    pub interval_secs: u64,
}

impl AppConfig {
    /// Load configuration from the default path (~/.murmur/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `MURMUR_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.model.api_key.is_none() {
            config.model.api_key = std::env::var("MURMUR_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("MURMUR_MODEL") {
            config.model.model = model;
        }

        if let Ok(base_url) = std::env::var("MURMUR_BASE_URL") {
            config.model.base_url = Some(base_url);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".murmur")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.conversation_history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "conversation_history_limit must be at least 1".into(),
            ));
        }

        if self.agent.reply_max_steps == 0 || self.agent.task_max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "step budgets must be at least 1".into(),
            ));
        }

        if self.scheduler.task_check_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "task_check_interval_secs must be at least 1".into(),
            ));
        }

        if let PolicyConfig::TwoPhase {
            idle_timeout_secs,
            fallback_timeout_secs,
        } = &self.scheduler.default_policy
            && fallback_timeout_secs <= idle_timeout_secs
        {
            return Err(ConfigError::ValidationError(
                "two_phase fallback_timeout_secs must exceed idle_timeout_secs".into(),
            ));
        }

        for routine in &self.routines {
            if routine.interval_secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "routine '{}': interval_secs must be at least 1",
                    routine.name
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.model.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.reply_max_steps, 6);
        assert!(config.agent.task_max_steps > config.agent.reply_max_steps);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.model, config.model.model);
        assert_eq!(
            parsed.scheduler.task_check_interval_secs,
            config.scheduler.task_check_interval_secs
        );
    }

    #[test]
    fn zero_history_limit_rejected() {
        let mut config = AppConfig::default();
        config.agent.conversation_history_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn two_phase_fallback_must_exceed_idle() {
        let mut config = AppConfig::default();
        config.scheduler.default_policy = PolicyConfig::TwoPhase {
            idle_timeout_secs: 600,
            fallback_timeout_secs: 600,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
    }

    #[test]
    fn policy_config_parsing() {
        let toml_str = r#"
[scheduler.default_policy]
type = "idle"
idle_timeout_secs = 120
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(matches!(
            config.scheduler.default_policy,
            PolicyConfig::Idle {
                idle_timeout_secs: 120
            }
        ));
    }

    #[test]
    fn routine_config_parsing() {
        let toml_str = r#"
[[routines]]
name = "morning_digest"
owner = "cli:local"
goal = "Summarize anything that needs my attention today"
interval_secs = 86400
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.routines.len(), 1);
        assert_eq!(config.routines[0].name, "morning_digest");
        assert_eq!(config.routines[0].interval_secs, 86400);
    }

    #[test]
    fn zero_interval_routine_rejected() {
        let mut config = AppConfig::default();
        config.routines.push(RoutineConfig {
            name: "broken".into(),
            owner: "cli:local".into(),
            goal: "never fires".into(),
            interval_secs: 0,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let mut config = AppConfig::default();
        config.model.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[model]
provider = "ollama"
model = "llama3.2"

[agent]
reply_max_steps = 4
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model.provider, "ollama");
        assert_eq!(config.agent.reply_max_steps, 4);
        // Unspecified sections fall back to defaults
        assert_eq!(config.agent.task_max_steps, 24);
    }
}
