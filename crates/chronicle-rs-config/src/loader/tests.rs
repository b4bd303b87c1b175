//! Tests for config parsing, validation and layered loading.

use super::*;
use crate::{HistoryProfile, WindowOverride};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

/// Options that only look at the given temp tree.
fn isolated_options(cwd: &Path) -> LayeredConfigOptions {
    let mut options = LayeredConfigOptions::new(cwd);
    options.system_config_path = None;
    options.user_config_path = None;
    options.requirements_path = None;
    options
}

#[test]
fn parse_minimal_config() {
    let config = ChronicleConfig::load_from_str("{}").expect("config");
    assert_eq!(config.history.capacity, 10);
    assert_eq!(config.history.window.max_messages, 10);
    assert_eq!(config.persistence.file_prefix, "history");
    assert!(config.persistence.pretty);
    assert_eq!(config.trends.numeric_field.as_deref(), Some("score"));
    assert_eq!(config, ChronicleConfig::default());
}

#[test]
fn parses_json5_with_comments_and_profiles() {
    let json5 = r#"{
        // chat keeps ten exchanges
        history: { capacity: 20, window: { max_messages: 8, max_chars: 4000 } },
        persistence: { dir: "exports", file_prefix: "conversation" },
        trends: { numeric_field: null },
        profiles: {
            sentiment: { capacity: 50, file_prefix: "sentiment_analysis_history" },
        },
    }"#;
    let config = ChronicleConfig::load_from_str(json5).expect("config");
    assert_eq!(config.history.capacity, 20);
    assert_eq!(config.history.window.max_chars, Some(4000));
    assert_eq!(config.persistence.dir.as_deref(), Some("exports"));
    assert_eq!(config.trends.numeric_field, None);
    assert_eq!(
        config.trends.categorical_field.as_deref(),
        Some("sentiment")
    );
    assert_eq!(config.profiles["sentiment"].capacity, Some(50));
}

#[test]
fn rejects_unknown_top_level_key() {
    let err = ChronicleConfig::load_from_str("{ unexpected: true }").unwrap_err();
    assert!(format!("{err}").contains("unknown key"));
}

#[test]
fn rejects_mistyped_capacity() {
    let err = ChronicleConfig::load_from_str(r#"{ history: { capacity: "ten" } }"#).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("history.capacity"));
}

#[test]
fn rejects_zero_capacity() {
    let err = ChronicleConfig::load_from_str("{ history: { capacity: 0 } }").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidField { path, .. } if path == "history.capacity"));
}

#[test]
fn rejects_zero_profile_window() {
    let json5 = "{ profiles: { voice: { window: { max_messages: 0 } } } }";
    let err = ChronicleConfig::load_from_str(json5).unwrap_err();
    assert!(format!("{err}").contains("profiles.voice.window.max_messages"));
}

#[test]
fn resolve_profile_applies_overrides() {
    let config = ChronicleConfig::builder()
        .profile(
            "voice",
            HistoryProfile {
                capacity: Some(5),
                window: Some(WindowOverride {
                    max_messages: Some(5),
                    max_chars: None,
                    system_prompt: Some("Keep it short.".to_string()),
                }),
                file_prefix: Some("voice".to_string()),
            },
        )
        .build();

    let resolved = config.resolve_profile(Some("voice")).expect("profile");
    assert_eq!(resolved.history.capacity, 5);
    assert_eq!(resolved.history.window.max_messages, 5);
    assert_eq!(
        resolved.history.window.system_prompt.as_deref(),
        Some("Keep it short.")
    );
    assert_eq!(resolved.file_prefix, "voice");

    let base = config.resolve_profile(None).expect("base");
    assert_eq!(base.history, config.history);
    assert_eq!(base.file_prefix, "history");

    let err = config.resolve_profile(Some("image")).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownProfile(name) if name == "image"));
}

#[test]
fn layered_config_prefers_repo_over_cwd() {
    let temp = TempDir::new().expect("tmp");
    let project_root = temp.path().join("project");
    fs::create_dir_all(project_root.join(".git")).expect("git");
    let cwd = project_root.join("subdir");
    fs::create_dir_all(&cwd).expect("cwd");

    let user_config = temp.path().join("user.json5");
    write_json5(&user_config, "{ history: { capacity: 11 } }");
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        "{ history: { capacity: 12 }, persistence: { pretty: false } }",
    );
    write_json5(&cwd.join(DEFAULT_CONFIG_FILE), "{ history: { capacity: 13 } }");
    write_json5(
        &project_root
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
        "{ history: { capacity: 14 } }",
    );

    let mut options = isolated_options(&cwd);
    options.user_config_path = Some(user_config);
    let layered = ChronicleConfig::load_layered_with_options(options).expect("layered");

    assert_eq!(layered.config.history.capacity, 14);
    assert!(!layered.config.persistence.pretty);
    let sources: Vec<ConfigLayerSource> =
        layered.layers.iter().map(|layer| layer.source).collect();
    assert_eq!(
        sources,
        vec![
            ConfigLayerSource::User,
            ConfigLayerSource::Project,
            ConfigLayerSource::Cwd,
            ConfigLayerSource::Repo,
        ]
    );
}

#[test]
fn runtime_override_wins_without_requirements() {
    let temp = TempDir::new().expect("tmp");
    let system_config = temp.path().join("system.json5");
    write_json5(&system_config, "{ history: { capacity: 30 } }");
    let runtime_config = temp.path().join("runtime.json5");
    write_json5(&runtime_config, "{ history: { capacity: 3 } }");

    let mut options = isolated_options(temp.path()).with_runtime_path(&runtime_config);
    options.system_config_path = Some(system_config);
    let layered = ChronicleConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.history.capacity, 3);
}

#[test]
fn requirements_lock_overrides() {
    let temp = TempDir::new().expect("tmp");
    let requirements = temp.path().join("requirements.json5");
    write_json5(&requirements, "{ history: { capacity: 20 } }");
    let runtime_config = temp.path().join("runtime.json5");
    write_json5(
        &runtime_config,
        "{ history: { capacity: 500, window: { max_messages: 4 } } }",
    );

    let mut options = isolated_options(temp.path()).with_runtime_path(&runtime_config);
    options.requirements_path = Some(requirements);
    let layered = ChronicleConfig::load_layered_with_options(options).expect("layered");

    assert_eq!(layered.config.history.capacity, 20);
    assert_eq!(layered.config.history.window.max_messages, 4);
    assert_eq!(layered.layers[0].source, ConfigLayerSource::Requirements);
}

#[test]
fn missing_runtime_layer_is_an_error() {
    let temp = TempDir::new().expect("tmp");
    let options =
        isolated_options(temp.path()).with_runtime_path(temp.path().join("absent.json5"));
    let err = ChronicleConfig::load_layered_with_options(options).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFailed(_)));
}

#[test]
fn invalid_layer_reports_its_label() {
    let temp = TempDir::new().expect("tmp");
    write_json5(
        &temp.path().join(DEFAULT_CONFIG_FILE),
        "{ persistence: { pretty: \"yes\" } }",
    );
    let err = ChronicleConfig::load_layered_with_options(isolated_options(temp.path()))
        .unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("cwd("));
    assert!(msg.contains("persistence.pretty"));
}

#[test]
fn rejects_blank_profile_name() {
    let err = ChronicleConfig::load_from_str(r#"{ profiles: { " ": { capacity: 3 } } }"#)
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}
