//! Context window assembly for the inference boundary.

use crate::model::{Record, Role};
use crate::store::HistoryStore;
use log::debug;
use serde::{Deserialize, Serialize};

/// Role/content pair handed to the external inference API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextMessage {
    pub role: Role,
    pub content: String,
}

/// Ordered suffix of a history, materialized on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextWindow {
    records: Vec<Record>,
    dropped_for_budget: usize,
    system_prompt: Option<String>,
}

impl ContextWindow {
    /// Selected records, oldest first.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records removed from the front to satisfy the character budget.
    pub fn dropped_for_budget(&self) -> usize {
        self.dropped_for_budget
    }

    /// Total content length of the selected records in characters.
    pub fn total_chars(&self) -> usize {
        self.records.iter().map(Record::content_chars).sum()
    }

    /// Outbound message sequence, with the system prompt first when set.
    pub fn to_messages(&self) -> Vec<ContextMessage> {
        let prompt = self.system_prompt.iter().map(|prompt| ContextMessage {
            role: Role::System,
            content: prompt.clone(),
        });
        prompt
            .chain(self.records.iter().map(|record| ContextMessage {
                role: record.role(),
                content: record.content().to_string(),
            }))
            .collect()
    }
}

/// Derives bounded context windows from a history store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindowBuilder {
    max_messages: usize,
    max_chars: Option<usize>,
    system_prompt: Option<String>,
}

impl ContextWindowBuilder {
    /// Builder selecting at most `max_messages` of the newest records.
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages,
            max_chars: None,
            system_prompt: None,
        }
    }

    /// Limit the summed content length of the selected records.
    pub fn with_max_chars(mut self, max_chars: Option<usize>) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Prompt emitted ahead of the records by `ContextWindow::to_messages`.
    ///
    /// The prompt does not count against either budget.
    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn max_chars(&self) -> Option<usize> {
        self.max_chars
    }

    /// Build a window from a point-in-time read of the store.
    pub fn build(&self, store: &HistoryStore) -> ContextWindow {
        let window = self.build_from(&store.tail(self.max_messages));
        debug!(
            "built context window (session_id={}, selected={}, dropped_for_budget={}, chars={})",
            store.session_id(),
            window.len(),
            window.dropped_for_budget(),
            window.total_chars()
        );
        window
    }

    /// Build a window over an already captured record sequence.
    pub fn build_from(&self, records: &[Record]) -> ContextWindow {
        let start = records.len().saturating_sub(self.max_messages);
        let selected = &records[start..];
        let keep_from = match self.max_chars {
            Some(max_chars) => budget_start(selected, max_chars),
            None => 0,
        };
        ContextWindow {
            records: selected[keep_from..].to_vec(),
            dropped_for_budget: keep_from,
            system_prompt: self.system_prompt.clone(),
        }
    }
}

/// Most recent `max_messages` records, oldest first, optionally trimmed from
/// the front until their content fits `max_chars`.
pub fn build(store: &HistoryStore, max_messages: usize, max_chars: Option<usize>) -> Vec<Record> {
    ContextWindowBuilder::new(max_messages)
        .with_max_chars(max_chars)
        .build(store)
        .into_records()
}

/// Index of the first record kept once whole records are dropped from the
/// front until the remainder fits the budget.
fn budget_start(records: &[Record], max_chars: usize) -> usize {
    let mut total: usize = records.iter().map(Record::content_chars).sum();
    let mut start = 0;
    while total > max_chars && start < records.len() {
        total -= records[start].content_chars();
        start += 1;
    }
    start
}
