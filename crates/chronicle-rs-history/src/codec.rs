//! Durable JSON representation of a history store.

use crate::error::HistoryError;
use crate::model::{Metadata, MetadataValue, Record, Role};
use crate::store::{HistorySnapshot, HistoryStore};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Current envelope format version.
pub const FORMAT_VERSION: u32 = 1;
/// Default prefix for timestamped export files.
pub const DEFAULT_FILE_PREFIX: &str = "history";

/// Envelope written by `save`.
#[derive(Debug, Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    session_id: Uuid,
    capacity: usize,
    records: &'a [Record],
}

/// Envelope read by `load`.
#[derive(Debug, Deserialize)]
struct Envelope {
    version: u32,
    #[serde(default)]
    session_id: Option<Uuid>,
    capacity: usize,
    records: Vec<Record>,
}

/// Entry of the bare-array files written before the envelope existed.
///
/// Conversation tools wrote `role`/`content` pairs; the analysis tools wrote
/// result objects with neither, which import as assistant records.
#[derive(Debug, Deserialize)]
struct LegacyRecord {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
    timestamp: String,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// Fields of tool result entries that carry the main text, in priority order.
const LEGACY_CONTENT_FIELDS: &[&str] = &[
    "summary",
    "explanation",
    "fixed_code",
    "optimized_code",
    "code",
    "description",
    "prompt",
    "text",
    "url",
];

/// Serializes stores to files and restores them.
///
/// Writes go to a temporary file in the destination directory which then
/// atomically replaces the destination, so readers only ever observe a
/// complete previous version or a complete new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceCodec {
    pretty: bool,
    file_prefix: String,
}

impl Default for PersistenceCodec {
    fn default() -> Self {
        Self {
            pretty: true,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }
}

impl PersistenceCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle indented output.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Prefix used by `save_timestamped`.
    pub fn with_file_prefix(mut self, file_prefix: impl Into<String>) -> Self {
        self.file_prefix = file_prefix.into();
        self
    }

    /// Encode a snapshot into the envelope format.
    pub fn encode(&self, snapshot: &HistorySnapshot) -> Result<String, HistoryError> {
        let envelope = EnvelopeRef {
            version: FORMAT_VERSION,
            session_id: snapshot.session_id,
            capacity: snapshot.capacity,
            records: &snapshot.records,
        };
        let encoded = if self.pretty {
            serde_json::to_string_pretty(&envelope)?
        } else {
            serde_json::to_string(&envelope)?
        };
        Ok(encoded)
    }

    /// Decode either an envelope or a legacy bare array.
    ///
    /// `capacity` overrides the stored capacity when given; legacy arrays
    /// carry none and require it. Sequences longer than the capacity keep
    /// their newest records.
    pub fn decode(
        &self,
        contents: &str,
        source_name: &str,
        capacity: Option<usize>,
    ) -> Result<HistoryStore, HistoryError> {
        let value: Value = serde_json::from_str(contents)
            .map_err(|err| HistoryError::corrupt(source_name, err.to_string()))?;
        let (session_id, stored_capacity, records) = match value {
            Value::Object(_) => decode_envelope(value, source_name)?,
            Value::Array(_) => (Uuid::new_v4(), None, decode_legacy(value, source_name)?),
            _ => {
                return Err(HistoryError::corrupt(
                    source_name,
                    "expected an object or an array at the top level",
                ));
            }
        };
        validate_chronology(&records, source_name)?;

        let capacity = match (capacity, stored_capacity) {
            (Some(capacity), _) => capacity,
            (None, Some(stored)) => stored,
            (None, None) => {
                return Err(HistoryError::CapacityMisconfigured(format!(
                    "{source_name} stores no capacity and none was supplied"
                )));
            }
        };
        let (store, evicted) = HistoryStore::restore(session_id, capacity, records)?;
        if evicted > 0 {
            warn!(
                "evicted records exceeding capacity on load (source={}, capacity={}, evicted={})",
                source_name, capacity, evicted
            );
        }
        Ok(store)
    }

    /// Save the store's current contents to `destination`.
    pub fn save(&self, store: &HistoryStore, destination: &Path) -> Result<(), HistoryError> {
        self.save_snapshot(&store.snapshot(), destination)
    }

    /// Save an already captured snapshot to `destination`.
    pub fn save_snapshot(
        &self,
        snapshot: &HistorySnapshot,
        destination: &Path,
    ) -> Result<(), HistoryError> {
        let encoded = self.encode(snapshot)?;
        write_atomic(destination, encoded.as_bytes())?;
        info!(
            "saved history (session_id={}, records={}, path={})",
            snapshot.session_id,
            snapshot.records.len(),
            destination.display()
        );
        Ok(())
    }

    /// Save into `dir` under `<prefix>_<YYYYmmdd_HHMMSS>.json`, returning the path.
    pub fn save_timestamped(&self, store: &HistoryStore, dir: &Path) -> Result<PathBuf, HistoryError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(timestamped_file_name(&self.file_prefix, Utc::now()));
        self.save(store, &path)?;
        Ok(path)
    }

    /// Load a store from `source`.
    pub fn load(&self, source: &Path, capacity: Option<usize>) -> Result<HistoryStore, HistoryError> {
        debug!("loading history (path={})", source.display());
        let contents = fs::read_to_string(source)?;
        let store = self.decode(&contents, &source.display().to_string(), capacity)?;
        info!(
            "loaded history (session_id={}, records={}, capacity={}, path={})",
            store.session_id(),
            store.len(),
            store.capacity(),
            source.display()
        );
        Ok(store)
    }
}

/// File name for a timestamped export.
pub fn timestamped_file_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}_{}.json", at.format("%Y%m%d_%H%M%S"))
}

fn decode_envelope(
    value: Value,
    source_name: &str,
) -> Result<(Uuid, Option<usize>, Vec<Record>), HistoryError> {
    let envelope: Envelope = serde_json::from_value(value)
        .map_err(|err| HistoryError::corrupt(source_name, err.to_string()))?;
    if envelope.version != FORMAT_VERSION {
        return Err(HistoryError::corrupt(
            source_name,
            format!("unsupported format version {}", envelope.version),
        ));
    }
    if envelope.capacity == 0 {
        return Err(HistoryError::corrupt(source_name, "stored capacity is zero"));
    }
    Ok((
        envelope.session_id.unwrap_or_else(Uuid::new_v4),
        Some(envelope.capacity),
        envelope.records,
    ))
}

fn decode_legacy(value: Value, source_name: &str) -> Result<Vec<Record>, HistoryError> {
    let entries: Vec<LegacyRecord> = serde_json::from_value(value)
        .map_err(|err| HistoryError::corrupt(source_name, err.to_string()))?;
    let mut records = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        let timestamp = parse_legacy_timestamp(&entry.timestamp).ok_or_else(|| {
            HistoryError::corrupt(
                source_name,
                format!("record {idx}: invalid timestamp {}", entry.timestamp),
            )
        })?;
        let LegacyRecord {
            role,
            content,
            mut extra,
            ..
        } = entry;
        let (role, content) = match (role, content) {
            (Some(role), Some(content)) => {
                let role: Role = role.parse().map_err(|_| {
                    HistoryError::corrupt(source_name, format!("record {idx}: invalid role {role}"))
                })?;
                (role, content)
            }
            (Some(_), None) => {
                return Err(HistoryError::corrupt(
                    source_name,
                    format!("record {idx}: role without content"),
                ));
            }
            (None, content) => {
                let content = content
                    .or_else(|| take_legacy_content(&mut extra))
                    .unwrap_or_default();
                (Role::Assistant, content)
            }
        };
        records.push(Record::restore(
            role,
            content,
            timestamp,
            legacy_metadata(extra),
        ));
    }
    Ok(records)
}

/// Move the first text-bearing field of a tool result entry out of `extra`.
fn take_legacy_content(extra: &mut BTreeMap<String, Value>) -> Option<String> {
    let field = LEGACY_CONTENT_FIELDS
        .iter()
        .find(|field| extra.get(**field).is_some_and(Value::is_string))?;
    match extra.remove(*field) {
        Some(Value::String(text)) => Some(text),
        _ => None,
    }
}

/// Accept RFC 3339 and the offset-less ISO form, read as UTC.
fn parse_legacy_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Scalars map directly; nested values are kept as compact JSON text and
/// nulls are dropped.
fn legacy_metadata(extra: BTreeMap<String, Value>) -> Metadata {
    let mut metadata = Metadata::new();
    for (key, value) in extra {
        let converted = match value {
            Value::Null => continue,
            Value::Bool(flag) => MetadataValue::Bool(flag),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => MetadataValue::Integer(integer),
                None => MetadataValue::Float(number.as_f64().unwrap_or_default()),
            },
            Value::String(text) => MetadataValue::Text(text),
            nested @ (Value::Array(_) | Value::Object(_)) => MetadataValue::Text(nested.to_string()),
        };
        metadata.insert(key, converted);
    }
    metadata
}

/// Chronology is checked, never repaired.
fn validate_chronology(records: &[Record], source_name: &str) -> Result<(), HistoryError> {
    for (idx, pair) in records.windows(2).enumerate() {
        if pair[1].timestamp() < pair[0].timestamp() {
            return Err(HistoryError::corrupt(
                source_name,
                format!(
                    "record {} is older than the record before it ({} < {})",
                    idx + 1,
                    pair[1].timestamp(),
                    pair[0].timestamp()
                ),
            ));
        }
    }
    Ok(())
}

/// Write through a sibling temp file and rename it over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), HistoryError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| HistoryError::Io(err.error))?;
    Ok(())
}
