//! Key-level schema validation for chronicle JSON5 layers.
//!
//! serde alone would silently ignore misspelled keys in a partial layer, so
//! each layer is checked here before merging.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Expected JSON shape of a leaf value.
#[derive(Debug, Clone, Copy)]
enum Kind {
    String,
    /// String or `null`.
    OptionalString,
    Bool,
    Integer,
}

impl Kind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Kind::String => value.is_string(),
            Kind::OptionalString => value.is_string() || value.is_null(),
            Kind::Bool => value.is_boolean(),
            Kind::Integer => value.is_u64(),
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Kind::String => "expected string",
            Kind::OptionalString => "expected string or null",
            Kind::Bool => "expected bool",
            Kind::Integer => "expected non-negative integer",
        }
    }
}

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(
        map,
        &["$schema", "history", "persistence", "trends", "profiles"],
        layer,
        "",
    )?;

    check_leaf(map, "$schema", Kind::String, layer, "")?;
    if let Some(value) = map.get("history") {
        validate_history(value, layer, "history")?;
    }
    if let Some(value) = map.get("persistence") {
        let path = "persistence";
        let map = expect_object(value, layer, path)?;
        ensure_allowed_keys(map, &["dir", "file_prefix", "pretty"], layer, path)?;
        check_leaf(map, "dir", Kind::String, layer, path)?;
        check_leaf(map, "file_prefix", Kind::String, layer, path)?;
        check_leaf(map, "pretty", Kind::Bool, layer, path)?;
    }
    if let Some(value) = map.get("trends") {
        let path = "trends";
        let map = expect_object(value, layer, path)?;
        ensure_allowed_keys(map, &["numeric_field", "categorical_field"], layer, path)?;
        check_leaf(map, "numeric_field", Kind::OptionalString, layer, path)?;
        check_leaf(map, "categorical_field", Kind::OptionalString, layer, path)?;
    }
    if let Some(value) = map.get("profiles") {
        let profiles = expect_object(value, layer, "profiles")?;
        for (name, profile) in profiles {
            validate_profile(profile, layer, &join_path("profiles", name))?;
        }
    }
    Ok(())
}

fn validate_history(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["capacity", "window"], layer, path)?;
    check_leaf(map, "capacity", Kind::Integer, layer, path)?;
    if let Some(value) = map.get("window") {
        validate_window(value, layer, &join_path(path, "window"))?;
    }
    Ok(())
}

fn validate_profile(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["capacity", "window", "file_prefix"], layer, path)?;
    check_leaf(map, "capacity", Kind::Integer, layer, path)?;
    check_leaf(map, "file_prefix", Kind::String, layer, path)?;
    if let Some(value) = map.get("window") {
        validate_window(value, layer, &join_path(path, "window"))?;
    }
    Ok(())
}

fn validate_window(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["max_messages", "max_chars", "system_prompt"],
        layer,
        path,
    )?;
    check_leaf(map, "max_messages", Kind::Integer, layer, path)?;
    check_leaf(map, "max_chars", Kind::Integer, layer, path)?;
    check_leaf(map, "system_prompt", Kind::String, layer, path)?;
    Ok(())
}

/// Check the kind of `map[key]` when present.
fn check_leaf(
    map: &Map<String, Value>,
    key: &str,
    kind: Kind,
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match map.get(key) {
        Some(value) if !kind.accepts(value) => {
            Err(invalid_field(layer, &join_path(path, key), kind.expected()))
        }
        _ => Ok(()),
    }
}

fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    value
        .as_object()
        .ok_or_else(|| invalid_field(layer, path, "expected object"))
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_field(layer, &join_path(path, key), "unknown key")),
        None => Ok(()),
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{path}"),
        message: message.to_string(),
    }
}
