use super::bucket::Bucket;
use crate::chart::{ChartKey, TrackId, Week};
use serde::Serialize;

/// Derived state of one track on one chart in one ok week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackMetricRecord {
    pub chart: ChartKey,
    pub track_id: TrackId,
    pub week: Week,
    /// From the most recent entry of the track at or before `week`.
    pub display_name: String,
    pub url: Option<String>,

    pub weeks_on_chart: u32,
    pub first_seen: Week,
    pub last_seen: Week,
    /// Consecutive present ok weeks ending at `week`; 0 when absent.
    pub streak: u32,
    pub max_streak: u32,
    pub reentry_count: u32,
    pub rank: Option<u32>,
    /// Previous present rank minus this rank; positive means the track climbed.
    pub rank_delta: Option<i64>,
    pub best_rank: u32,
    pub best_rank_week: Week,
    pub avg_rank: f64,
    /// Population stddev of every present rank so far.
    pub rank_stddev: f64,
    pub top10_weeks: u32,
    pub top25_weeks: u32,
    /// Present ok weeks over ok weeks since first seen.
    pub presence_ratio: f64,
    pub momentum: Option<f64>,
    pub volatility: f64,
    pub durability: f64,
    pub bucket: Bucket,
}

impl TrackMetricRecord {
    pub fn is_present(&self) -> bool {
        self.rank.is_some()
    }
}
