use super::compute::{compute_from_history, evaluation_week, weeks_observed};
use super::models::TrackMetricRecord;
use super::settings::MetricsSettings;
use super::MetricsError;
use crate::chart::{ChartKey, Week};
use crate::snapshot_store::SnapshotStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Reads snapshot history from the store and derives metrics from it.
pub struct MetricsEngine {
    store: Arc<dyn SnapshotStore>,
    settings: MetricsSettings,
}

impl MetricsEngine {
    pub fn new(store: Arc<dyn SnapshotStore>, settings: MetricsSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &MetricsSettings {
        &self.settings
    }

    /// The full metric series of every track seen on `chart` up to `through`.
    pub fn compute(
        &self,
        chart: &ChartKey,
        through: Week,
    ) -> Result<Vec<TrackMetricRecord>, MetricsError> {
        let history = self.store.history(chart, through)?;
        debug!(
            "Loaded {} snapshots for chart {} through {}",
            history.len(),
            chart,
            through
        );
        let records = compute_from_history(chart, &history, through, &self.settings)?;
        info!(
            "Computed {} metric records for chart {} through {}",
            records.len(),
            chart,
            through
        );
        Ok(records)
    }

    /// Ok weeks recorded for `chart` at or before `through`.
    pub fn weeks_observed(&self, chart: &ChartKey, through: Week) -> Result<usize, MetricsError> {
        let history = self.store.history(chart, through)?;
        Ok(weeks_observed(&history, through))
    }

    /// Records of the evaluation week only: the latest ok week at or before
    /// `through`. `None` when the chart has no ok week in range.
    pub fn compute_as_of(
        &self,
        chart: &ChartKey,
        through: Week,
    ) -> Result<Option<(Week, Vec<TrackMetricRecord>)>, MetricsError> {
        let history = self.store.history(chart, through)?;
        let Some(week) = evaluation_week(&history, through) else {
            return Ok(None);
        };
        let records = compute_from_history(chart, &history, through, &self.settings)?
            .into_iter()
            .filter(|r| r.week == week)
            .collect();
        Ok(Some((week, records)))
    }
}
