//! emora-store — append-only SQLite event log and trend aggregation.
//!
//! Detection events are written once at accept time and never updated or
//! deleted by the application. Aggregation turns the log into fixed-size
//! calendar-bucketed count series for the trend views.

pub mod analytics;
pub mod store;

pub use store::{DetectionEvent, EventStore, StoreError};
