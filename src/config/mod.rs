mod file_config;

pub use file_config::{
    ChartConfig, FetchConfig, FileConfig, MetricsConfig, ThresholdsConfig, WeightsConfig,
};

use crate::chart::ChartDefinition;
use crate::fetch::FetchSettings;
use crate::metrics::{BucketThresholds, MetricsSettings, ScoreWeights};
use anyhow::{bail, Result};
use std::collections::HashSet;
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "data/charts.db";
pub const DEFAULT_DEBUG_DIR: &str = "data/debug";
pub const DEFAULT_OUTPUT_DIR: &str = "docs";

/// Charts tracked when the config file does not list any.
pub fn default_charts() -> Vec<ChartDefinition> {
    vec![
        ChartDefinition::new(
            "overall-top-100",
            "Beatport Top 100",
            "https://www.beatport.com/top-100",
        ),
        ChartDefinition::new(
            "house-top-100",
            "House Top 100",
            "https://www.beatport.com/genre/house/5/top-100",
        ),
        ChartDefinition::new(
            "techno-top-100",
            "Techno (Peak Time / Driving) Top 100",
            "https://www.beatport.com/genre/techno-peak-time-driving/6/top-100",
        ),
        ChartDefinition::new(
            "overall-hype-100",
            "Beatport Hype 100",
            "https://www.beatport.com/hype",
        ),
    ]
}

/// CLI arguments that can be overridden by the TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_path: PathBuf,
    pub debug_dir: PathBuf,
    pub output_dir: PathBuf,
    pub parallel_fetch: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            debug_dir: PathBuf::from(DEFAULT_DEBUG_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            parallel_fetch: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub debug_dir: PathBuf,
    pub output_dir: PathBuf,
    pub parallel_fetch: bool,

    pub charts: Vec<ChartDefinition>,
    pub fetch: FetchSettings,
    pub metrics: MetricsSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.db_path.clone());
        let debug_dir = file
            .debug_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.debug_dir.clone());
        let output_dir = file
            .output_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.output_dir.clone());
        let parallel_fetch = file.parallel_fetch.unwrap_or(cli.parallel_fetch);

        let charts = if file.charts.is_empty() {
            default_charts()
        } else {
            file.charts
                .iter()
                .map(|c| ChartDefinition::new(&c.key, &c.name, &c.url))
                .collect()
        };
        let mut seen = HashSet::new();
        for chart in &charts {
            if !chart.key.is_valid() {
                bail!(
                    "Chart key '{}' must be non-empty and use only letters, digits, '_' or '-' (url: {})",
                    chart.key,
                    chart.url
                );
            }
            if !seen.insert(chart.key.clone()) {
                bail!("Chart key '{}' is configured more than once", chart.key);
            }
        }

        let fetch_file = file.fetch.unwrap_or_default();
        let fetch_defaults = FetchSettings::default();
        let fetch = FetchSettings {
            attempts: fetch_file.attempts.unwrap_or(fetch_defaults.attempts),
            base_delay_ms: fetch_file
                .base_delay_ms
                .unwrap_or(fetch_defaults.base_delay_ms),
            timeout_secs: fetch_file.timeout_secs.unwrap_or(fetch_defaults.timeout_secs),
            user_agent: fetch_file.user_agent.unwrap_or(fetch_defaults.user_agent),
            max_entries: fetch_file.max_entries.unwrap_or(fetch_defaults.max_entries),
        };
        if fetch.attempts == 0 {
            bail!("fetch.attempts must be at least 1");
        }

        let metrics = resolve_metrics(file.metrics.unwrap_or_default());
        if let Err(e) = metrics.validate() {
            bail!("{}", e);
        }

        Ok(Self {
            db_path,
            debug_dir,
            output_dir,
            parallel_fetch,
            charts,
            fetch,
            metrics,
        })
    }
}

fn resolve_metrics(m: MetricsConfig) -> MetricsSettings {
    let defaults = MetricsSettings::default();
    let w = m.weights.unwrap_or_default();
    let t = m.thresholds.unwrap_or_default();
    let (dw, dt) = (defaults.weights, defaults.thresholds);

    MetricsSettings {
        window_weeks: m.window_weeks.unwrap_or(defaults.window_weeks),
        absence_penalty: m.absence_penalty.unwrap_or(defaults.absence_penalty),
        momentum_scale: m.momentum_scale.unwrap_or(defaults.momentum_scale),
        volatility_scale: m.volatility_scale.unwrap_or(defaults.volatility_scale),
        weights: ScoreWeights {
            longevity: w.longevity.unwrap_or(dw.longevity),
            streak: w.streak.unwrap_or(dw.streak),
            momentum: w.momentum.unwrap_or(dw.momentum),
            stability: w.stability.unwrap_or(dw.stability),
        },
        thresholds: BucketThresholds {
            anchor_min_weeks: t.anchor_min_weeks.unwrap_or(dt.anchor_min_weeks),
            anchor_min_streak: t.anchor_min_streak.unwrap_or(dt.anchor_min_streak),
            climber_min_momentum: t.climber_min_momentum.unwrap_or(dt.climber_min_momentum),
            climber_max_weeks: t.climber_max_weeks.unwrap_or(dt.climber_max_weeks),
            fader_max_momentum: t.fader_max_momentum.unwrap_or(dt.fader_max_momentum),
            spike_max_weeks: t.spike_max_weeks.unwrap_or(dt.spike_max_weeks),
        },
    }
}
