//! Common test infrastructure
//!
//! End-to-end tests drive the real SQLite store on disk with a scripted
//! fetcher in place of the HTTP adapter.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{entry, TestPipeline, WEEK_1};
//!
//! #[test]
//! fn test_ingest() {
//!     let pipeline = TestPipeline::new(&["x-top-100"]);
//!     pipeline.fetcher.set_entries("x-top-100", vec![entry(1, "Song")]);
//!     pipeline.ingest(WEEK_1);
//! }
//! ```

mod constants;
mod fixtures;

pub use constants::*;
pub use fixtures::{entry, ScriptedFetcher, TestPipeline};
