//! Record model shared by the store, window builder, codec and trends.

use crate::error::HistoryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Open metadata map carried by every record.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Who produced a record's content.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Lowercase wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = HistoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            _ => Err(HistoryError::InvalidRecordKind(value.to_string())),
        }
    }
}

/// Scalar metadata value.
///
/// Integers and floats are distinct variants so that `7` and `7.5` keep
/// their JSON number shape through a save/load cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    /// Numeric view of the value, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Integer(value) => Some(*value as f64),
            MetadataValue::Float(value) => Some(*value),
            MetadataValue::Bool(_) | MetadataValue::Text(_) => None,
        }
    }

    /// Text view of the value, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(value) => write!(f, "{value}"),
            MetadataValue::Integer(value) => write!(f, "{value}"),
            MetadataValue::Float(value) => write!(f, "{value}"),
            MetadataValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        MetadataValue::Integer(i64::from(value))
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        i64::try_from(value)
            .map(MetadataValue::Integer)
            .unwrap_or(MetadataValue::Float(value as f64))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

/// An interaction that has not been appended yet.
///
/// The store assigns the id and timestamp when it accepts the record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    role: Role,
    content: String,
    metadata: Metadata,
}

impl NewRecord {
    /// Create an unstamped record with no metadata.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Unstamped user record.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Unstamped assistant record.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Unstamped system record.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Parse the role from its string form.
    pub fn parse(role: &str, content: impl Into<String>) -> Result<Self, HistoryError> {
        Ok(Self::new(role.parse()?, content))
    }

    /// Attach a metadata entry, replacing any previous value for the key.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merge a whole metadata map into the record.
    pub fn with_metadata_map(mut self, metadata: Metadata) -> Self {
        self.metadata.extend(metadata);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Turn the draft into an immutable record stamped at `timestamp`.
    pub(crate) fn stamp(self, timestamp: DateTime<Utc>) -> Result<Record, HistoryError> {
        validate_metadata(&self.metadata)?;
        Ok(Record {
            id: Uuid::new_v4(),
            role: self.role,
            content: self.content,
            timestamp,
            metadata: self.metadata,
        })
    }
}

/// One immutable logged interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    metadata: Metadata,
}

impl Record {
    /// Rebuild a record from persisted parts.
    pub(crate) fn restore(
        role: Role,
        content: String,
        timestamp: DateTime<Utc>,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            timestamp,
            metadata,
        }
    }

    /// Record identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Time the record was accepted by a store.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Lookup a single metadata entry.
    pub fn metadata_value(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    /// Content length in Unicode scalar values.
    pub fn content_chars(&self) -> usize {
        self.content.chars().count()
    }
}

/// Reject values that cannot survive a JSON round trip.
fn validate_metadata(metadata: &Metadata) -> Result<(), HistoryError> {
    for (key, value) in metadata {
        if let MetadataValue::Float(number) = value
            && !number.is_finite()
        {
            return Err(HistoryError::InvalidMetadata {
                key: key.clone(),
                reason: format!("non-finite float {number}"),
            });
        }
    }
    Ok(())
}
