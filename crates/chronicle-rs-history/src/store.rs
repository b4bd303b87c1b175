//! Bounded, FIFO-evicting interaction history.

use crate::error::HistoryError;
use crate::model::{NewRecord, Record};
use chrono::Utc;
use log::debug;
use parking_lot::RwLock;
use std::collections::VecDeque;
use uuid::Uuid;

/// Point-in-time copy of a store, taken under a single read lock.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    /// Session the history belongs to.
    pub session_id: Uuid,
    /// Capacity of the store at snapshot time.
    pub capacity: usize,
    /// Records in chronological order.
    pub records: Vec<Record>,
}

/// Ordered, capacity-aware container of records.
///
/// `append` and `clear` take the write lock; every read takes the read lock
/// and copies out, so callers never hold an alias into internal storage.
#[derive(Debug)]
pub struct HistoryStore {
    session_id: Uuid,
    capacity: usize,
    records: RwLock<VecDeque<Record>>,
}

impl HistoryStore {
    /// Create an empty store for a fresh session.
    pub fn new(capacity: usize) -> Result<Self, HistoryError> {
        Self::with_session_id(Uuid::new_v4(), capacity)
    }

    /// Create an empty store bound to an existing session id.
    pub fn with_session_id(session_id: Uuid, capacity: usize) -> Result<Self, HistoryError> {
        ensure_capacity(capacity)?;
        Ok(Self {
            session_id,
            capacity,
            records: RwLock::new(VecDeque::with_capacity(capacity)),
        })
    }

    /// Rebuild a store from already validated records, keeping the newest
    /// `capacity` of them. Returns the store and the number evicted.
    pub(crate) fn restore(
        session_id: Uuid,
        capacity: usize,
        records: Vec<Record>,
    ) -> Result<(Self, usize), HistoryError> {
        ensure_capacity(capacity)?;
        let evicted = records.len().saturating_sub(capacity);
        let retained: VecDeque<Record> = records.into_iter().skip(evicted).collect();
        Ok((
            Self {
                session_id,
                capacity,
                records: RwLock::new(retained),
            },
            evicted,
        ))
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Maximum number of records retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stamp and append a record, evicting from the head when over capacity.
    ///
    /// Timestamps never go backwards within a store: a clock that reads
    /// earlier than the newest record reuses that record's timestamp.
    pub fn append(&self, record: NewRecord) -> Result<Record, HistoryError> {
        let mut records = self.records.write();
        let now = Utc::now();
        let timestamp = match records.back() {
            Some(last) if last.timestamp() > now => last.timestamp(),
            _ => now,
        };
        let record = record.stamp(timestamp)?;
        records.push_back(record.clone());

        let mut evicted = 0;
        while records.len() > self.capacity {
            records.pop_front();
            evicted += 1;
        }
        debug!(
            "appended history record (session_id={}, role={}, content_chars={}, evicted={}, len={})",
            self.session_id,
            record.role(),
            record.content_chars(),
            evicted,
            records.len()
        );
        Ok(record)
    }

    /// Parse the role string and append.
    pub fn append_raw(&self, role: &str, content: impl Into<String>) -> Result<Record, HistoryError> {
        self.append(NewRecord::parse(role, content)?)
    }

    /// Copy of every record in chronological order.
    pub fn all(&self) -> Vec<Record> {
        self.records.read().iter().cloned().collect()
    }

    /// Copy of the newest `count` records in chronological order.
    pub fn tail(&self, count: usize) -> Vec<Record> {
        let records = self.records.read();
        let start = records.len().saturating_sub(count);
        records.iter().skip(start).cloned().collect()
    }

    /// Consistent copy of the store contents and identity.
    pub fn snapshot(&self) -> HistorySnapshot {
        let records = self.records.read();
        HistorySnapshot {
            session_id: self.session_id,
            capacity: self.capacity,
            records: records.iter().cloned().collect(),
        }
    }

    /// Remove every record. Clearing an empty store is a no-op.
    pub fn clear(&self) {
        let mut records = self.records.write();
        let removed = records.len();
        records.clear();
        debug!(
            "cleared history (session_id={}, removed={})",
            self.session_id, removed
        );
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn ensure_capacity(capacity: usize) -> Result<(), HistoryError> {
    if capacity == 0 {
        return Err(HistoryError::CapacityMisconfigured(
            "capacity must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
