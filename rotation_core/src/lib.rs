#![forbid(unsafe_code)]

//! Core domain model and business logic for the Siterot injection-site
//! rotation system.
//!
//! This crate provides:
//! - Domain types (points, areas, history entries, preferences)
//! - The static body-map catalog
//! - Point status evaluation (cooldown)
//! - Next-site recommendation scoring
//! - The append-only history store with import/export
//! - Rolling-window usage metrics
//! - Persistence (key-value store, CSV export, app config)

pub mod types;
pub mod error;
pub mod catalog;
pub mod prefs;
pub mod config;
pub mod logging;
pub mod kv;
pub mod status;
pub mod recommend;
pub mod store;
pub mod metrics;
pub mod csv_export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog, Catalog};
pub use prefs::Preferences;
pub use config::Config;
pub use kv::{ensure_schema_version, FileStore, KeyValueStore, MemoryStore, SCHEMA_VERSION};
pub use status::status_of;
pub use recommend::suggest;
pub use store::HistoryStore;
pub use metrics::{window_metrics, WindowMetrics};
pub use csv_export::write_history_csv;

/// Milliseconds in one day, the unit all cooldown and window math is based on.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Current wall-clock time as epoch milliseconds.
///
/// All pure functions take `now` explicitly; this is the single place the
/// mutating paths reach for the clock.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
