//! Public SDK surface for chronicle.
//!
//! This crate re-exports the history and config building blocks and wires
//! them into a config-driven `HistorySession` so each tool sets up its
//! history the same way.

/// Re-export for convenience.
pub use chronicle_rs_config as config;
/// Re-export for convenience.
pub use chronicle_rs_history as history;

mod session;

pub use session::{HistorySession, SessionError};

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::builder()
            .format_timestamp_millis()
            .parse_default_env()
            .try_init();
    }
}
