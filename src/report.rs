//! JSON export consumed by the static page renderer.

use crate::aggregation::{aggregate, CrossChartSummary};
use crate::chart::{ChartDefinition, ChartKey, Week};
use crate::metrics::{MetricsEngine, MetricsError, MetricsSettings, TrackMetricRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const REPORT_FILE_NAME: &str = "report.json";

#[derive(Debug, Clone, Serialize)]
pub struct ChartReport {
    pub chart: ChartKey,
    pub name: String,
    pub url: String,
    pub evaluation_week: Option<Week>,
    /// Ok weeks on record up to the report week.
    pub weeks_observed: usize,
    /// Evaluation-week records, most durable first.
    pub tracks: Vec<TrackMetricRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub through_week: Week,
    pub settings: MetricsSettings,
    pub charts: Vec<ChartReport>,
    /// Tracks by number of charts, then best score.
    pub cross_chart: Vec<CrossChartSummary>,
}

fn by_durability(a: &TrackMetricRecord, b: &TrackMetricRecord) -> Ordering {
    b.durability
        .total_cmp(&a.durability)
        .then_with(|| match (a.rank, b.rank) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.track_id.cmp(&b.track_id))
}

pub fn build_report(
    engine: &MetricsEngine,
    charts: &[ChartDefinition],
    through: Week,
) -> Result<Report, MetricsError> {
    let mut chart_reports = Vec::with_capacity(charts.len());
    let mut per_chart = Vec::with_capacity(charts.len());

    for chart in charts {
        let (evaluation_week, mut tracks) = match engine.compute_as_of(&chart.key, through)? {
            Some((week, records)) => (Some(week), records),
            None => (None, Vec::new()),
        };
        let weeks_observed = engine.weeks_observed(&chart.key, through)?;
        tracks.sort_by(by_durability);
        per_chart.push((chart.key.clone(), tracks.clone()));
        chart_reports.push(ChartReport {
            chart: chart.key.clone(),
            name: chart.name.clone(),
            url: chart.url.clone(),
            evaluation_week,
            weeks_observed,
            tracks,
        });
    }

    let mut cross_chart: Vec<CrossChartSummary> = aggregate(&per_chart).into_values().collect();
    cross_chart.sort_by(|a, b| {
        b.total_charts
            .cmp(&a.total_charts)
            .then_with(|| {
                let (sa, sb) = (a.best_score().unwrap_or(0.0), b.best_score().unwrap_or(0.0));
                sb.total_cmp(&sa)
            })
            .then_with(|| a.track_id.cmp(&b.track_id))
    });

    Ok(Report {
        generated_at: Utc::now().trunc_subsecs(0),
        through_week: through,
        settings: engine.settings().clone(),
        charts: chart_reports,
        cross_chart,
    })
}

/// Writes `report` as `<output_dir>/report.json` and returns the path.
pub fn write_report(report: &Report, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;
    let path = output_dir.join(REPORT_FILE_NAME);
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    fs::write(&path, json).with_context(|| format!("Failed to write report {:?}", path))?;
    info!("Report written to {:?}", path);
    Ok(path)
}
