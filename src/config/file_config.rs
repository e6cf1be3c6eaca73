use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (override CLI)
    pub db_path: Option<String>,
    pub debug_dir: Option<String>,
    pub output_dir: Option<String>,
    pub parallel_fetch: Option<bool>,

    /// Replaces the built-in chart registry when non-empty.
    pub charts: Vec<ChartConfig>,
    pub fetch: Option<FetchConfig>,
    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    pub key: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct FetchConfig {
    pub attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub max_entries: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    pub window_weeks: Option<usize>,
    pub absence_penalty: Option<f64>,
    pub momentum_scale: Option<f64>,
    pub volatility_scale: Option<f64>,
    pub weights: Option<WeightsConfig>,
    pub thresholds: Option<ThresholdsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct WeightsConfig {
    pub longevity: Option<f64>,
    pub streak: Option<f64>,
    pub momentum: Option<f64>,
    pub stability: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ThresholdsConfig {
    pub anchor_min_weeks: Option<u32>,
    pub anchor_min_streak: Option<u32>,
    pub climber_min_momentum: Option<f64>,
    pub climber_max_weeks: Option<u32>,
    pub fader_max_momentum: Option<f64>,
    pub spike_max_weeks: Option<u32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
