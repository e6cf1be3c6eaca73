//! Cross-chart view over per-chart metric outputs.
//!
//! Only set and max operations over already computed durability scores; no
//! score is recomputed or reweighted here.

use crate::chart::{ChartKey, TrackId, Week};
use crate::metrics::{MetricsEngine, MetricsError, TrackMetricRecord};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossChartSummary {
    pub track_id: TrackId,
    pub display_name: String,
    pub charts: BTreeSet<ChartKey>,
    pub best_score_per_chart: BTreeMap<ChartKey, f64>,
    pub total_charts: usize,
}

impl CrossChartSummary {
    /// Highest durability over all charts the track appears in.
    pub fn best_score(&self) -> Option<f64> {
        self.best_score_per_chart
            .values()
            .copied()
            .fold(None, |best, s| Some(best.map_or(s, |b: f64| b.max(s))))
    }
}

/// Folds per-chart records into one summary per track.
///
/// Tracks are keyed by identity, so the same track on two charts lands in
/// one summary.
pub fn aggregate(per_chart: &[(ChartKey, Vec<TrackMetricRecord>)]) -> BTreeMap<TrackId, CrossChartSummary> {
    let mut out: BTreeMap<TrackId, CrossChartSummary> = BTreeMap::new();
    for (chart, records) in per_chart {
        for record in records {
            let summary = out
                .entry(record.track_id.clone())
                .or_insert_with(|| CrossChartSummary {
                    track_id: record.track_id.clone(),
                    display_name: record.display_name.clone(),
                    charts: BTreeSet::new(),
                    best_score_per_chart: BTreeMap::new(),
                    total_charts: 0,
                });
            summary.charts.insert(chart.clone());
            summary
                .best_score_per_chart
                .entry(chart.clone())
                .and_modify(|s| *s = s.max(record.durability))
                .or_insert(record.durability);
            summary.total_charts = summary.charts.len();
        }
    }
    out
}

/// Evaluation-week metrics of every chart in `charts`, aggregated by track.
pub fn across_charts(
    engine: &MetricsEngine,
    charts: &[ChartKey],
    through: Week,
) -> Result<BTreeMap<TrackId, CrossChartSummary>, MetricsError> {
    let mut per_chart = Vec::with_capacity(charts.len());
    for chart in charts {
        if let Some((_, records)) = engine.compute_as_of(chart, through)? {
            per_chart.push((chart.clone(), records));
        }
    }
    Ok(aggregate(&per_chart))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Bucket;

    fn record(chart: &str, track: &TrackId, durability: f64) -> TrackMetricRecord {
        let week: Week = "2026-01-05".parse().unwrap();
        TrackMetricRecord {
            chart: ChartKey::new(chart),
            track_id: track.clone(),
            week,
            display_name: "Artist - Song".to_string(),
            url: None,
            weeks_on_chart: 1,
            first_seen: week,
            last_seen: week,
            streak: 1,
            max_streak: 1,
            reentry_count: 0,
            rank: Some(1),
            rank_delta: None,
            best_rank: 1,
            best_rank_week: week,
            avg_rank: 1.0,
            rank_stddev: 0.0,
            top10_weeks: 1,
            top25_weeks: 1,
            presence_ratio: 1.0,
            momentum: None,
            volatility: 0.0,
            durability,
            bucket: Bucket::Spike,
        }
    }

    #[test]
    fn test_track_on_two_charts() {
        let t = TrackId::derive("Song", None, &["Artist".to_string()], &[]);
        let other = TrackId::derive("Other", None, &["Artist".to_string()], &[]);
        let per_chart = vec![
            (ChartKey::new("a"), vec![record("a", &t, 0.8), record("a", &other, 0.3)]),
            (ChartKey::new("b"), vec![record("b", &t, 0.5)]),
        ];

        let view = aggregate(&per_chart);

        let summary = &view[&t];
        assert_eq!(
            summary.charts,
            BTreeSet::from([ChartKey::new("a"), ChartKey::new("b")])
        );
        assert_eq!(summary.best_score_per_chart[&ChartKey::new("a")], 0.8);
        assert_eq!(summary.best_score_per_chart[&ChartKey::new("b")], 0.5);
        assert_eq!(summary.best_score(), Some(0.8));
        assert_eq!(summary.total_charts, 2);
        assert_eq!(view[&other].total_charts, 1);
    }

    #[test]
    fn test_best_score_within_one_chart() {
        let t = TrackId::derive("Song", None, &[], &[]);
        let per_chart = vec![(
            ChartKey::new("a"),
            vec![record("a", &t, 0.2), record("a", &t, 0.6)],
        )];
        let view = aggregate(&per_chart);
        assert_eq!(view[&t].best_score_per_chart[&ChartKey::new("a")], 0.6);
        assert_eq!(view[&t].total_charts, 1);
    }
}
