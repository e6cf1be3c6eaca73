//! Weekly chart durability tracking.
//!
//! Ingests weekly chart snapshots into SQLite, derives per-track durability
//! metrics from the snapshot history, and exports them for static reports.

pub mod aggregation;
pub mod chart;
pub mod config;
pub mod fetch;
pub mod ingestion;
pub mod metrics;
pub mod report;
pub mod snapshot_store;
pub mod sqlite_persistence;
pub mod status;

// Re-export commonly used types for convenience
pub use chart::{ChartDefinition, ChartEntry, ChartKey, TrackId, Week};
pub use ingestion::{ChartOutcome, IngestReport, IngestionOrchestrator};
pub use metrics::{Bucket, MetricsEngine, MetricsError, MetricsSettings, TrackMetricRecord};
pub use snapshot_store::{Snapshot, SnapshotStore, SqliteSnapshotStore, StoreError};
