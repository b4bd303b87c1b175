//! Config-driven wiring of a tool's history.

use chronicle_rs_config::{ChronicleConfig, ConfigError, ResolvedProfile};
use chronicle_rs_history::{
    ContextMessage, ContextWindow, ContextWindowBuilder, HistoryError, HistoryStore, NewRecord,
    PersistenceCodec, Record, Role, TrendAggregator, TrendSnapshot,
};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors returned while setting up or driving a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("history error: {0}")]
    History(#[from] HistoryError),
    /// `export` was called without `persistence.dir` configured.
    #[error("no export directory configured (set persistence.dir)")]
    ExportDirUnset,
}

/// One tool's history together with the window, codec and trend settings
/// resolved from config.
#[derive(Debug, Clone)]
pub struct HistorySession {
    profile: ResolvedProfile,
    store: Arc<HistoryStore>,
    window: ContextWindowBuilder,
    codec: PersistenceCodec,
    trends: TrendAggregator,
    export_dir: Option<PathBuf>,
}

impl HistorySession {
    /// Start an empty session for `profile` (or the base history settings).
    pub fn from_config(
        config: &ChronicleConfig,
        profile: Option<&str>,
    ) -> Result<Self, SessionError> {
        let resolved = config.resolve_profile(profile)?;
        let store = HistoryStore::new(resolved.history.capacity)?;
        Ok(Self::assemble(config, resolved, store))
    }

    /// Restore a session from a saved file, bounded by the profile capacity.
    pub fn restore(
        config: &ChronicleConfig,
        profile: Option<&str>,
        source: &Path,
    ) -> Result<Self, SessionError> {
        let resolved = config.resolve_profile(profile)?;
        let codec = codec_for(config, &resolved);
        let store = codec.load(source, Some(resolved.history.capacity))?;
        Ok(Self::assemble(config, resolved, store))
    }

    fn assemble(config: &ChronicleConfig, profile: ResolvedProfile, store: HistoryStore) -> Self {
        let window = ContextWindowBuilder::new(profile.history.window.max_messages)
            .with_max_chars(profile.history.window.max_chars)
            .with_system_prompt(profile.history.window.system_prompt.clone());
        let trends = TrendAggregator::new()
            .with_numeric_field(config.trends.numeric_field.clone())
            .with_categorical_field(config.trends.categorical_field.clone());
        info!(
            "history session ready (profile={}, session_id={}, capacity={}, records={})",
            profile.name.as_deref().unwrap_or("default"),
            store.session_id(),
            store.capacity(),
            store.len()
        );
        Self {
            codec: codec_for(config, &profile),
            export_dir: config.persistence.dir.as_ref().map(PathBuf::from),
            profile,
            store: Arc::new(store),
            window,
            trends,
        }
    }

    /// Shared handle to the underlying store.
    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    pub fn profile(&self) -> &ResolvedProfile {
        &self.profile
    }

    /// Append a single record.
    pub fn record(&self, record: NewRecord) -> Result<Record, SessionError> {
        Ok(self.store.append(record)?)
    }

    /// Append a user turn followed by the assistant reply.
    pub fn record_exchange(
        &self,
        user: impl Into<String>,
        assistant: impl Into<String>,
    ) -> Result<(Record, Record), SessionError> {
        let user = self.store.append(NewRecord::user(user))?;
        let assistant = self.store.append(NewRecord::assistant(assistant))?;
        Ok((user, assistant))
    }

    /// Current context window.
    pub fn context(&self) -> ContextWindow {
        self.window.build(&self.store)
    }

    /// Messages for the next inference call: the context window followed by
    /// the pending user input, which is not yet part of the history.
    pub fn messages_with_input(&self, input: &str) -> Vec<ContextMessage> {
        let mut messages = self.context().to_messages();
        messages.push(ContextMessage {
            role: Role::User,
            content: input.to_string(),
        });
        messages
    }

    /// Save under the configured export directory with a timestamped name.
    pub fn export(&self) -> Result<PathBuf, SessionError> {
        let dir = self.export_dir.as_ref().ok_or(SessionError::ExportDirUnset)?;
        Ok(self.codec.save_timestamped(&self.store, dir)?)
    }

    /// Save to an explicit destination.
    pub fn save_to(&self, destination: &Path) -> Result<(), SessionError> {
        Ok(self.codec.save(&self.store, destination)?)
    }

    /// Trends over the current contents.
    pub fn trends(&self) -> TrendSnapshot {
        self.trends.summarize(&self.store.all())
    }
}

fn codec_for(config: &ChronicleConfig, profile: &ResolvedProfile) -> PersistenceCodec {
    PersistenceCodec::new()
        .with_pretty(config.persistence.pretty)
        .with_file_prefix(profile.file_prefix.clone())
}
