//! Weekly ingestion: one snapshot per configured chart, whatever happens to
//! the other charts.

mod orchestrator;
mod outcome;

pub use orchestrator::IngestionOrchestrator;
pub use outcome::{ChartOutcome, IngestReport};
