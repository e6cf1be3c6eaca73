use crate::chart::{ChartEntry, ChartKey, Week};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Failure messages longer than this are cut before they are stored.
pub const FAILURE_MESSAGE_MAX_CHARS: usize = 200;

/// Recorded outcome of a snapshot attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Ok,
    Failed,
}

impl SnapshotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotStatus::Ok => "ok",
            SnapshotStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(SnapshotStatus::Ok),
            "failed" => Some(SnapshotStatus::Failed),
            _ => None,
        }
    }
}

/// Why a chart could not be turned into a usable snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The adapter produced zero entries. Usually an upstream page change.
    EmptyResult,
    /// The fetched page did not have the expected structure.
    Parse,
    /// Network or HTTP failure after the adapter's own retries.
    Transport,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::EmptyResult => "empty_result",
            FailureKind::Parse => "parse",
            FailureKind::Transport => "transport",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "empty_result" => Some(FailureKind::EmptyResult),
            "parse" => Some(FailureKind::Parse),
            "transport" => Some(FailureKind::Transport),
            _ => None,
        }
    }
}

/// Diagnostic payload of a failed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Size of the raw fetched payload, when one was received.
    pub payload_bytes: Option<u64>,
    /// Where the diagnostics sink put the raw payload, if anywhere.
    pub debug_artifact: Option<String>,
}

impl SnapshotFailure {
    pub fn new(kind: FailureKind, message: &str) -> Self {
        Self {
            kind,
            message: truncate_chars(message, FAILURE_MESSAGE_MAX_CHARS),
            payload_bytes: None,
            debug_artifact: None,
        }
    }

    pub fn with_payload_bytes(mut self, bytes: u64) -> Self {
        self.payload_bytes = Some(bytes);
        self
    }

    pub fn with_debug_artifact(mut self, artifact: Option<String>) -> Self {
        self.debug_artifact = artifact;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SnapshotState {
    Ok { entries: Vec<ChartEntry> },
    Failed(SnapshotFailure),
}

/// One (chart, week) ingestion record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub chart: ChartKey,
    pub week: Week,
    pub fetched_at: DateTime<Utc>,
    pub state: SnapshotState,
}

impl Snapshot {
    pub fn ok(chart: ChartKey, week: Week, fetched_at: DateTime<Utc>, entries: Vec<ChartEntry>) -> Self {
        Self {
            chart,
            week,
            fetched_at: fetched_at.trunc_subsecs(0),
            state: SnapshotState::Ok { entries },
        }
    }

    pub fn failed(
        chart: ChartKey,
        week: Week,
        fetched_at: DateTime<Utc>,
        failure: SnapshotFailure,
    ) -> Self {
        Self {
            chart,
            week,
            fetched_at: fetched_at.trunc_subsecs(0),
            state: SnapshotState::Failed(failure),
        }
    }

    pub fn status(&self) -> SnapshotStatus {
        match self.state {
            SnapshotState::Ok { .. } => SnapshotStatus::Ok,
            SnapshotState::Failed(_) => SnapshotStatus::Failed,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status() == SnapshotStatus::Ok
    }

    /// Entries of an ok snapshot; `None` for a failed one.
    pub fn entries(&self) -> Option<&[ChartEntry]> {
        match &self.state {
            SnapshotState::Ok { entries } => Some(entries),
            SnapshotState::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&SnapshotFailure> {
        match &self.state {
            SnapshotState::Ok { .. } => None,
            SnapshotState::Failed(failure) => Some(failure),
        }
    }
}

pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => s[..cut].to_string(),
        None => s.to_string(),
    }
}
