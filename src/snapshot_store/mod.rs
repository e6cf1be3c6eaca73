//! Persistence of weekly chart snapshots.
//!
//! A snapshot is the single record of one ingestion attempt for a
//! (chart, week) pair. Writes are upserts keyed on that pair; nothing else
//! ever edits a committed snapshot.

mod error;
mod models;
mod schema;
mod sqlite_snapshot_store;

pub use error::StoreError;
pub use models::{
    FailureKind, Snapshot, SnapshotFailure, SnapshotState, SnapshotStatus,
    FAILURE_MESSAGE_MAX_CHARS,
};
pub(crate) use models::truncate_chars;
pub use schema::SNAPSHOT_VERSIONED_SCHEMAS;
pub use sqlite_snapshot_store::SqliteSnapshotStore;

use crate::chart::{ChartKey, Week};

pub trait SnapshotStore: Send + Sync {
    /// Inserts or replaces the snapshot for `(snapshot.chart, snapshot.week)`.
    ///
    /// The snapshot row and its entries are written in one transaction.
    fn upsert(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Every recorded attempt for `chart` up to and including `through`,
    /// ascending by week.
    fn history(&self, chart: &ChartKey, through: Week) -> Result<Vec<Snapshot>, StoreError>;

    /// Most recent snapshot for `chart`, ok or failed.
    fn latest(&self, chart: &ChartKey) -> Result<Option<Snapshot>, StoreError>;

    /// Most recent snapshot for `chart` at or before `through`.
    fn latest_through(&self, chart: &ChartKey, through: Week) -> Result<Option<Snapshot>, StoreError>;

    /// Charts with at least one recorded snapshot.
    fn charts(&self) -> Result<Vec<ChartKey>, StoreError>;

    /// Latest week with any recorded snapshot, across all charts.
    fn latest_week(&self) -> Result<Option<Week>, StoreError>;
}
