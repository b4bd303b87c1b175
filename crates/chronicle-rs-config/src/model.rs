//! Configuration schema for chronicle.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root config for the chronicle SDK.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ChronicleConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub trends: TrendsConfig,
    /// Per-tool overrides keyed by tool name (e.g. `chat`, `sentiment`).
    #[serde(default)]
    pub profiles: BTreeMap<String, HistoryProfile>,
}

impl ChronicleConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> ChronicleConfigBuilder {
        ChronicleConfigBuilder::new()
    }

    /// Validate invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_history(&self.history, "history")?;
        for (name, profile) in &self.profiles {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "profile names must not be empty".to_string(),
                ));
            }
            if profile.capacity == Some(0) {
                return Err(ConfigError::InvalidField {
                    path: format!("profiles.{name}.capacity"),
                    message: "capacity must be greater than zero".to_string(),
                });
            }
            if let Some(window) = &profile.window {
                validate_window_override(window, &format!("profiles.{name}.window"))?;
            }
        }
        Ok(())
    }

    /// Resolve the effective history settings for a tool profile.
    ///
    /// `None` selects the top-level `history` section unchanged.
    pub fn resolve_profile(&self, name: Option<&str>) -> Result<ResolvedProfile, ConfigError> {
        let mut history = self.history.clone();
        let mut file_prefix = self.persistence.file_prefix.clone();
        if let Some(name) = name {
            let profile = self
                .profiles
                .get(name)
                .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;
            if let Some(capacity) = profile.capacity {
                history.capacity = capacity;
            }
            if let Some(window) = &profile.window {
                window.apply(&mut history.window);
            }
            if let Some(prefix) = &profile.file_prefix {
                file_prefix = prefix.clone();
            }
        }
        Ok(ResolvedProfile {
            name: name.map(str::to_string),
            history,
            file_prefix,
        })
    }
}

/// Builder for assembling a `ChronicleConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct ChronicleConfigBuilder {
    config: ChronicleConfig,
}

impl ChronicleConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: ChronicleConfig::default(),
        }
    }

    /// Replace the default history settings.
    pub fn history(mut self, history: HistoryConfig) -> Self {
        self.config.history = history;
        self
    }

    /// Replace the persistence settings.
    pub fn persistence(mut self, persistence: PersistenceConfig) -> Self {
        self.config.persistence = persistence;
        self
    }

    /// Replace the trend settings.
    pub fn trends(mut self, trends: TrendsConfig) -> Self {
        self.config.trends = trends;
        self
    }

    /// Add or replace a named tool profile.
    pub fn profile(mut self, name: impl Into<String>, profile: HistoryProfile) -> Self {
        self.config.profiles.insert(name.into(), profile);
        self
    }

    /// Finalize and return the built `ChronicleConfig`.
    pub fn build(self) -> ChronicleConfig {
        self.config
    }
}

/// Bound and windowing for a history store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub window: WindowConfig,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            window: WindowConfig::default(),
        }
    }
}

/// Default record capacity, the smallest bound used by the chat tools.
fn default_capacity() -> usize {
    10
}

/// Context window budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowConfig {
    #[serde(default = "default_window_messages")]
    pub max_messages: usize,
    #[serde(default)]
    pub max_chars: Option<usize>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_messages: default_window_messages(),
            max_chars: None,
            system_prompt: None,
        }
    }
}

/// Default number of records sent as context.
fn default_window_messages() -> usize {
    10
}

/// Where and how histories are exported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            dir: None,
            file_prefix: default_file_prefix(),
            pretty: default_pretty(),
        }
    }
}

fn default_file_prefix() -> String {
    "history".to_string()
}

fn default_pretty() -> bool {
    true
}

/// Metadata fields the trend aggregator reads. `null` disables a field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendsConfig {
    #[serde(default = "default_numeric_field")]
    pub numeric_field: Option<String>,
    #[serde(default = "default_categorical_field")]
    pub categorical_field: Option<String>,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            numeric_field: default_numeric_field(),
            categorical_field: default_categorical_field(),
        }
    }
}

fn default_numeric_field() -> Option<String> {
    Some("score".to_string())
}

fn default_categorical_field() -> Option<String> {
    Some("sentiment".to_string())
}

/// Partial overrides for one tool.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HistoryProfile {
    #[serde(default)]
    pub capacity: Option<usize>,
    #[serde(default)]
    pub window: Option<WindowOverride>,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

/// Partial window overrides for a profile.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WindowOverride {
    #[serde(default)]
    pub max_messages: Option<usize>,
    #[serde(default)]
    pub max_chars: Option<usize>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl WindowOverride {
    fn apply(&self, window: &mut WindowConfig) {
        if let Some(max_messages) = self.max_messages {
            window.max_messages = max_messages;
        }
        if self.max_chars.is_some() {
            window.max_chars = self.max_chars;
        }
        if self.system_prompt.is_some() {
            window.system_prompt = self.system_prompt.clone();
        }
    }
}

/// Effective settings for one tool after profile overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
    pub name: Option<String>,
    pub history: HistoryConfig,
    pub file_prefix: String,
}

fn validate_history(history: &HistoryConfig, path: &str) -> Result<(), ConfigError> {
    if history.capacity == 0 {
        return Err(ConfigError::InvalidField {
            path: format!("{path}.capacity"),
            message: "capacity must be greater than zero".to_string(),
        });
    }
    validate_window_override(
        &WindowOverride {
            max_messages: Some(history.window.max_messages),
            max_chars: history.window.max_chars,
            system_prompt: None,
        },
        &format!("{path}.window"),
    )
}

fn validate_window_override(window: &WindowOverride, path: &str) -> Result<(), ConfigError> {
    if window.max_messages == Some(0) {
        return Err(ConfigError::InvalidField {
            path: format!("{path}.max_messages"),
            message: "max_messages must be greater than zero".to_string(),
        });
    }
    if window.max_chars == Some(0) {
        return Err(ConfigError::InvalidField {
            path: format!("{path}.max_chars"),
            message: "max_chars must be greater than zero when set".to_string(),
        });
    }
    Ok(())
}
