use super::bucket::{Bucket, BucketInput};
use super::models::TrackMetricRecord;
use super::settings::MetricsSettings;
use super::MetricsError;
use crate::chart::{ChartEntry, ChartKey, TrackId, Week};
use crate::snapshot_store::Snapshot;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// An ok week with its entries indexed by track.
struct OkWeek<'a> {
    week: Week,
    entries: HashMap<&'a TrackId, &'a ChartEntry>,
}

/// Latest ok week at or before `through` in an ascending history.
pub fn evaluation_week(history: &[Snapshot], through: Week) -> Option<Week> {
    history
        .iter()
        .filter(|s| s.week <= through && s.is_ok())
        .map(|s| s.week)
        .max()
}

/// Number of ok weeks at or before `through`.
pub fn weeks_observed(history: &[Snapshot], through: Week) -> usize {
    history
        .iter()
        .filter(|s| s.week <= through && s.is_ok())
        .count()
}

/// Computes every track's metric series for `chart` from its snapshot history.
///
/// One record per (track, ok week) from the track's first appearance through
/// the evaluation week, ordered by week, then by rank for present tracks,
/// then by track id for absent ones.
pub fn compute_from_history(
    chart: &ChartKey,
    history: &[Snapshot],
    through: Week,
    settings: &MetricsSettings,
) -> Result<Vec<TrackMetricRecord>, MetricsError> {
    settings.validate()?;
    let ok_weeks = collect_ok_weeks(chart, history, through)?;

    let mut first_index: HashMap<&TrackId, usize> = HashMap::new();
    for (i, ok_week) in ok_weeks.iter().enumerate() {
        for track in ok_week.entries.keys() {
            first_index.entry(*track).or_insert(i);
        }
    }

    let mut records = Vec::new();
    for (track, first) in first_index {
        track_series(chart, track, first, &ok_weeks, settings, &mut records);
    }
    records.sort_by(record_order);
    Ok(records)
}

fn collect_ok_weeks<'a>(
    chart: &ChartKey,
    history: &'a [Snapshot],
    through: Week,
) -> Result<Vec<OkWeek<'a>>, MetricsError> {
    let mut ok_weeks = Vec::new();
    let mut previous: Option<Week> = None;

    for snapshot in history {
        if &snapshot.chart != chart {
            return Err(MetricsError::ChartMismatch {
                expected: chart.clone(),
                found: snapshot.chart.clone(),
            });
        }
        if let Some(prev) = previous {
            if snapshot.week <= prev {
                return Err(MetricsError::UnorderedHistory {
                    chart: chart.clone(),
                    previous: prev,
                    week: snapshot.week,
                });
            }
        }
        previous = Some(snapshot.week);

        if snapshot.week > through {
            continue;
        }
        let Some(entries) = snapshot.entries() else {
            continue;
        };

        let mut by_track = HashMap::with_capacity(entries.len());
        let mut ranks = HashSet::with_capacity(entries.len());
        for entry in entries {
            if entry.rank == 0 {
                return Err(MetricsError::InvalidRank {
                    chart: chart.clone(),
                    week: snapshot.week,
                    rank: entry.rank,
                });
            }
            if !ranks.insert(entry.rank) {
                return Err(MetricsError::DuplicateRank {
                    chart: chart.clone(),
                    week: snapshot.week,
                    rank: entry.rank,
                });
            }
            if by_track.insert(&entry.track_id, entry).is_some() {
                return Err(MetricsError::DuplicateTrack {
                    chart: chart.clone(),
                    week: snapshot.week,
                    track: entry.track_id.clone(),
                });
            }
        }
        ok_weeks.push(OkWeek {
            week: snapshot.week,
            entries: by_track,
        });
    }
    Ok(ok_weeks)
}

fn record_order(a: &TrackMetricRecord, b: &TrackMetricRecord) -> Ordering {
    a.week.cmp(&b.week).then_with(|| match (a.rank, b.rank) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.track_id.cmp(&b.track_id),
    })
}

fn track_series(
    chart: &ChartKey,
    track: &TrackId,
    first: usize,
    ok_weeks: &[OkWeek<'_>],
    settings: &MetricsSettings,
    out: &mut Vec<TrackMetricRecord>,
) {
    let series: Vec<Option<&ChartEntry>> = ok_weeks[first..]
        .iter()
        .map(|w| w.entries.get(track).copied())
        .collect();
    let ranks: Vec<Option<u32>> = series.iter().map(|e| e.map(|e| e.rank)).collect();
    let first_seen = ok_weeks[first].week;

    let mut weeks_on_chart = 0u32;
    let mut streak = 0u32;
    let mut max_streak = 0u32;
    let mut reentry_count = 0u32;
    let mut present_ranks: Vec<f64> = Vec::new();
    let mut top10_weeks = 0u32;
    let mut top25_weeks = 0u32;
    let mut last_present: Option<(Week, u32)> = None;
    let mut best: Option<(u32, Week)> = None;
    let mut latest_entry: Option<&ChartEntry> = None;

    for (k, entry) in series.iter().copied().enumerate() {
        let week = ok_weeks[first + k].week;
        let mut rank_delta = None;

        match entry {
            Some(entry) => {
                let rank = entry.rank;
                if k > 0 && ranks[k - 1].is_none() {
                    reentry_count += 1;
                }
                rank_delta = last_present.map(|(_, prev)| prev as i64 - rank as i64);
                weeks_on_chart += 1;
                streak += 1;
                max_streak = max_streak.max(streak);
                present_ranks.push(rank as f64);
                if rank <= 10 {
                    top10_weeks += 1;
                }
                if rank <= 25 {
                    top25_weeks += 1;
                }
                if best.map_or(true, |(b, _)| rank < b) {
                    best = Some((rank, week));
                }
                last_present = Some((week, rank));
                latest_entry = Some(entry);
            }
            None => streak = 0,
        }

        // The first week of the series is always present, so these are set.
        let (Some((best_rank, best_rank_week)), Some((last_seen, _)), Some(display)) =
            (best, last_present, latest_entry)
        else {
            continue;
        };

        let observed = (first + k + 1) as f64;
        let momentum = momentum(&ranks[..=k], settings);
        let volatility = volatility(&ranks[..=k], settings.window_weeks);
        let durability = durability(
            weeks_on_chart,
            streak,
            observed,
            momentum,
            volatility,
            settings,
        );
        let bucket = Bucket::classify(
            &BucketInput {
                weeks_on_chart,
                streak,
                momentum,
                has_prior_presence: k > 0,
            },
            &settings.thresholds,
        );

        out.push(TrackMetricRecord {
            chart: chart.clone(),
            track_id: track.clone(),
            week,
            display_name: display.display_name(),
            url: display.url.clone(),
            weeks_on_chart,
            first_seen,
            last_seen,
            streak,
            max_streak,
            reentry_count,
            rank: ranks[k],
            rank_delta,
            best_rank,
            best_rank_week,
            avg_rank: present_ranks.iter().sum::<f64>() / weeks_on_chart as f64,
            rank_stddev: pop_stddev(&present_ranks),
            top10_weeks,
            top25_weeks,
            presence_ratio: weeks_on_chart as f64 / (k + 1) as f64,
            momentum,
            volatility,
            durability,
            bucket,
        });
    }
}

/// Mean per-week rank change over the trailing window of a series that
/// starts at the track's first appearance.
///
/// Each step is the rank improvement vs the previous ok week; an absent week
/// costs `absence_penalty`, and a re-entry counts as no movement.
fn momentum(ranks: &[Option<u32>], settings: &MetricsSettings) -> Option<f64> {
    let last = ranks.len() - 1;
    let start = (last + 1).saturating_sub(settings.window_weeks).max(1);
    if start > last {
        return None;
    }
    let steps: Vec<f64> = (start..=last)
        .map(|j| match (ranks[j - 1], ranks[j]) {
            (Some(prev), Some(curr)) => prev as f64 - curr as f64,
            (_, None) => -settings.absence_penalty,
            (None, Some(_)) => 0.0,
        })
        .collect();
    Some(steps.iter().sum::<f64>() / steps.len() as f64)
}

/// Population standard deviation of the present ranks in the trailing window.
fn volatility(ranks: &[Option<u32>], window: usize) -> f64 {
    let start = ranks.len().saturating_sub(window);
    let present: Vec<f64> = ranks[start..].iter().flatten().map(|r| *r as f64).collect();
    pop_stddev(&present)
}

fn pop_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

fn durability(
    weeks_on_chart: u32,
    streak: u32,
    observed: f64,
    momentum: Option<f64>,
    volatility: f64,
    settings: &MetricsSettings,
) -> f64 {
    let w = &settings.weights;
    let longevity = (weeks_on_chart as f64).ln_1p() / observed.ln_1p();
    let streak_norm = streak as f64 / observed;
    let momentum_norm = momentum
        .map(|m| clamp01((m / settings.momentum_scale + 1.0) / 2.0))
        .unwrap_or(0.5);
    let stability = 1.0 / (1.0 + volatility / settings.volatility_scale);

    let score = w.longevity * longevity
        + w.streak * streak_norm
        + w.momentum * momentum_norm
        + w.stability * stability;
    clamp01(score / w.total())
}
