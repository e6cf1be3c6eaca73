//! Pipeline status: what the store holds per chart and how far metrics reach.

use crate::chart::{ChartKey, Week};
use crate::metrics::{MetricsEngine, MetricsError};
use crate::snapshot_store::{truncate_chars, SnapshotState, SnapshotStore};
use serde::Serialize;
use std::fmt;

/// Failure reasons are cut to this many characters in the status view.
pub const STATUS_REASON_MAX_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SnapshotView {
    /// No snapshot was ever recorded for the chart in range.
    Missing,
    Ok { week: Week, entries: usize },
    Failed { week: Week, reason: String },
}

impl fmt::Display for SnapshotView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotView::Missing => write!(f, "MISSING (entries: -)"),
            SnapshotView::Ok { week, entries } => write!(f, "{} (entries: {})", week, entries),
            SnapshotView::Failed { week, reason } => {
                write!(f, "{} FAILED ({}) (entries: 0)", week, reason)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricCoverage {
    /// Week the metrics are evaluated at; `None` without any ok week.
    pub evaluation_week: Option<Week>,
    pub tracks: usize,
}

impl fmt::Display for MetricCoverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.evaluation_week {
            Some(week) => write!(f, "{} (rows: {})", week, self.tracks),
            None => write!(f, "MISSING (rows: -)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartStatus {
    pub chart: ChartKey,
    pub snapshot: SnapshotView,
    pub metrics: MetricCoverage,
}

impl fmt::Display for ChartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "* {}", self.chart)?;
        writeln!(f, "  snapshots: {}", self.snapshot)?;
        write!(f, "  metrics:   {}", self.metrics)
    }
}

fn preview(reason: &str) -> String {
    if reason.chars().count() > STATUS_REASON_MAX_CHARS {
        format!("{}...", truncate_chars(reason, STATUS_REASON_MAX_CHARS))
    } else {
        reason.to_string()
    }
}

/// Latest snapshot state and metric coverage of each chart, as of `through`.
pub fn status(
    store: &dyn SnapshotStore,
    engine: &MetricsEngine,
    charts: &[ChartKey],
    through: Week,
) -> Result<Vec<ChartStatus>, MetricsError> {
    charts
        .iter()
        .map(|chart| -> Result<ChartStatus, MetricsError> {
            let snapshot = match store.latest_through(chart, through)? {
                None => SnapshotView::Missing,
                Some(s) => match &s.state {
                    SnapshotState::Ok { entries } => SnapshotView::Ok {
                        week: s.week,
                        entries: entries.len(),
                    },
                    SnapshotState::Failed(failure) => SnapshotView::Failed {
                        week: s.week,
                        reason: preview(&failure.message),
                    },
                },
            };
            let metrics = match engine.compute_as_of(chart, through)? {
                Some((week, records)) => MetricCoverage {
                    evaluation_week: Some(week),
                    tracks: records.len(),
                },
                None => MetricCoverage {
                    evaluation_week: None,
                    tracks: 0,
                },
            };
            Ok(ChartStatus {
                chart: chart.clone(),
                snapshot,
                metrics,
            })
        })
        .collect()
}
