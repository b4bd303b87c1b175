//! Error types for config loading and validation.

use thiserror::Error;

/// Errors returned while loading, validating, or resolving config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading a config file failed.
    #[error("failed to read config: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// A config file is not valid JSON5.
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] json5::Error),
    /// The merged document did not decode into the schema types.
    #[error("failed to decode config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A specific field failed validation.
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// A history profile was requested that the config does not define.
    #[error("unknown history profile: {0}")]
    UnknownProfile(String),
    /// Generic validation failure.
    #[error("invalid config: {0}")]
    Invalid(String),
}
