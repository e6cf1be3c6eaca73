//! Chart registry types and the weekly time bucket.

mod models;
mod week;

pub use models::{ChartDefinition, ChartEntry, ChartKey, TrackId};
pub use week::{Week, WeekParseError};
