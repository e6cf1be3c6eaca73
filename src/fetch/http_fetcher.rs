use super::parser::parse_chart;
use super::{ChartFetcher, FetchError};
use crate::chart::{ChartDefinition, ChartEntry};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Charts shorter than this are logged as suspicious but still accepted.
const EXPECTED_CHART_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Total attempts per chart, including the first one.
    pub attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt.
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_entries: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 1000,
            timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_entries: 100,
        }
    }
}

impl FetchSettings {
    /// Backoff before attempt `attempt` (1-based). Zero before the first one.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 2u64.saturating_pow(attempt - 2);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Fetches chart pages over HTTP and parses them into entries.
pub struct HttpChartFetcher {
    client: Client,
    settings: FetchSettings,
}

impl HttpChartFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, settings })
    }

    fn fetch_once(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client.get(url).send()?.error_for_status()?.text()
    }

    fn fetch_with_retry(&self, url: &str) -> Result<String, FetchError> {
        let attempts = self.settings.attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            let delay = self.settings.delay_before(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            match self.fetch_once(url) {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!(
                        "Fetch attempt {}/{} for {} failed: {}",
                        attempt, attempts, url, e
                    );
                    last_error = e.to_string();
                }
            }
        }
        Err(FetchError::Transport {
            message: format!("{} after {} attempts", last_error, attempts),
        })
    }
}

impl ChartFetcher for HttpChartFetcher {
    fn fetch_and_parse(&self, chart: &ChartDefinition) -> Result<Vec<ChartEntry>, FetchError> {
        info!("Fetching chart {} ({})", chart.key, chart.url);
        let html = self.fetch_with_retry(&chart.url)?;
        info!("Fetched chart {} ({} bytes)", chart.key, html.len());

        let entries = match parse_chart(&html, self.settings.max_entries) {
            Ok(entries) => entries,
            Err(e) => {
                return Err(FetchError::Parse {
                    message: e.to_string(),
                    payload: Some(html),
                })
            }
        };

        if entries.is_empty() {
            return Err(FetchError::EmptyResult {
                payload: Some(html),
            });
        }
        if entries.len() < EXPECTED_CHART_LENGTH.min(self.settings.max_entries) {
            warn!(
                "Parsed {} entries for chart {} (expected up to {})",
                entries.len(),
                chart.key,
                self.settings.max_entries
            );
        }
        Ok(entries)
    }
}
