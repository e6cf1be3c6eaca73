//! Fetch/parse adapter boundary.
//!
//! The ingestion orchestrator only sees [`ChartFetcher`] and [`FetchError`].
//! [`HttpChartFetcher`] is the production adapter; tests script their own.

mod diagnostics;
mod http_fetcher;
mod parser;

pub use diagnostics::{DiagnosticsSink, FileDiagnosticsSink, NoopDiagnosticsSink};
pub use http_fetcher::{FetchSettings, HttpChartFetcher};
pub use parser::{parse_chart, ChartParseError};

use crate::chart::{ChartDefinition, ChartEntry};
use crate::snapshot_store::FailureKind;
use thiserror::Error;

/// Classified failure of a fetch+parse attempt.
///
/// Raw payloads travel with the error so they can be handed to a
/// [`DiagnosticsSink`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("Parse failure: {message}")]
    Parse {
        message: String,
        payload: Option<String>,
    },

    #[error("Empty result (count=0)")]
    EmptyResult { payload: Option<String> },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Transport { .. } => FailureKind::Transport,
            FetchError::Parse { .. } => FailureKind::Parse,
            FetchError::EmptyResult { .. } => FailureKind::EmptyResult,
        }
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            FetchError::Transport { .. } => None,
            FetchError::Parse { payload, .. } | FetchError::EmptyResult { payload } => {
                payload.as_deref()
            }
        }
    }
}

/// Turns a chart definition into its current ranked entries.
///
/// Implementations own their retry and timeout policy; a returned
/// `FetchError::Transport` is terminal for this run.
pub trait ChartFetcher: Send + Sync {
    fn fetch_and_parse(&self, chart: &ChartDefinition) -> Result<Vec<ChartEntry>, FetchError>;
}
