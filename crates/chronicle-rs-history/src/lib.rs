//! Bounded interaction history and context window management.

pub mod codec;
pub mod error;
pub mod model;
pub mod store;
pub mod trends;
pub mod window;

/// Persistence codec and helpers.
pub use codec::{DEFAULT_FILE_PREFIX, FORMAT_VERSION, PersistenceCodec, timestamped_file_name};
/// History error type.
pub use error::HistoryError;
/// Record model.
pub use model::{Metadata, MetadataValue, NewRecord, Record, Role};
/// Bounded store and snapshots.
pub use store::{HistorySnapshot, HistoryStore};
/// Trend aggregation.
pub use trends::{
    CategoricalSummary, CategoryCount, NumericSummary, TrendAggregator, TrendSnapshot, summarize,
};
/// Context window assembly.
pub use window::{ContextMessage, ContextWindow, ContextWindowBuilder, build};
