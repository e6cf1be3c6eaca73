use crate::chart::{ChartKey, Week};
use crate::snapshot_store::FailureKind;
use serde::Serialize;
use std::fmt;

/// What happened to a single chart during an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChartOutcome {
    /// An ok snapshot with `entries` rows was recorded.
    Ok { entries: usize },
    /// A failed snapshot was recorded.
    Failed { kind: FailureKind, reason: String },
    /// The snapshot write itself failed; the chart has no snapshot for the week.
    NotRecorded { reason: String },
}

impl ChartOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ChartOutcome::Ok { .. })
    }
}

impl fmt::Display for ChartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartOutcome::Ok { entries } => write!(f, "ok ({} entries)", entries),
            ChartOutcome::Failed { kind, reason } => {
                write!(f, "failed [{}]: {}", kind.as_str(), reason)
            }
            ChartOutcome::NotRecorded { reason } => write!(f, "not recorded: {}", reason),
        }
    }
}

/// Per-chart outcomes of one `ingest` call, in chart registry order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub week: Week,
    pub outcomes: Vec<(ChartKey, ChartOutcome)>,
}

impl IngestReport {
    pub fn outcome(&self, chart: &ChartKey) -> Option<&ChartOutcome> {
        self.outcomes
            .iter()
            .find(|(key, _)| key == chart)
            .map(|(_, outcome)| outcome)
    }

    pub fn ok_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_ok()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.ok_count()
    }
}
