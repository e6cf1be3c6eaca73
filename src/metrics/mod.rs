//! Per-chart durability metrics.
//!
//! Everything here is recomputed from the snapshot history on each call.
//! Failed weeks are "no data": they are skipped, never read as absences.

mod bucket;
mod compute;
mod engine;
mod models;
mod settings;

pub use bucket::{Bucket, BucketInput};
pub use compute::{compute_from_history, evaluation_week, weeks_observed};
pub use engine::MetricsEngine;
pub use models::TrackMetricRecord;
pub use settings::{BucketThresholds, MetricsSettings, ScoreWeights};

use crate::chart::{ChartKey, TrackId, Week};
use crate::snapshot_store::StoreError;
use thiserror::Error;

/// Metrics failures are not contained: callers get the error, never a
/// partial metric set.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("History for chart {expected} contains a snapshot of chart {found}")]
    ChartMismatch { expected: ChartKey, found: ChartKey },

    #[error("History for chart {chart} is not strictly ascending: {week} after {previous}")]
    UnorderedHistory {
        chart: ChartKey,
        previous: Week,
        week: Week,
    },

    #[error("Chart {chart} week {week} lists track {track} more than once")]
    DuplicateTrack {
        chart: ChartKey,
        week: Week,
        track: TrackId,
    },

    #[error("Chart {chart} week {week} has rank {rank} more than once")]
    DuplicateRank { chart: ChartKey, week: Week, rank: u32 },

    #[error("Chart {chart} week {week} has invalid rank {rank}")]
    InvalidRank { chart: ChartKey, week: Week, rank: u32 },

    #[error("Invalid metrics settings: {0}")]
    InvalidSettings(String),
}
