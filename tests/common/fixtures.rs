//! Test pipeline wiring: on-disk store, scripted fetcher, file diagnostics.

use chart_durability::chart::{ChartDefinition, ChartEntry, ChartKey, Week};
use chart_durability::fetch::{ChartFetcher, FetchError, FileDiagnosticsSink};
use chart_durability::ingestion::{IngestReport, IngestionOrchestrator};
use chart_durability::metrics::{MetricsEngine, MetricsSettings};
use chart_durability::snapshot_store::SqliteSnapshotStore;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub fn entry(rank: u32, title: &str) -> ChartEntry {
    ChartEntry::new(
        rank,
        title,
        Some("Extended Mix"),
        vec![format!("{} Artist", title)],
        vec![],
    )
}

#[derive(Clone)]
enum Script {
    Entries(Vec<ChartEntry>),
    Transport(String),
    Parse(String),
    Empty,
}

/// Fetcher whose answer per chart is set by the test before each run.
/// Charts without a script fail with a transport error.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
}

#[allow(dead_code)]
impl ScriptedFetcher {
    fn set(&self, chart: &str, script: Script) {
        self.scripts.lock().unwrap().insert(chart.to_string(), script);
    }

    pub fn set_entries(&self, chart: &str, entries: Vec<ChartEntry>) {
        self.set(chart, Script::Entries(entries));
    }

    pub fn set_transport_failure(&self, chart: &str, message: &str) {
        self.set(chart, Script::Transport(message.to_string()));
    }

    pub fn set_parse_failure(&self, chart: &str, html: &str) {
        self.set(chart, Script::Parse(html.to_string()));
    }

    pub fn set_empty(&self, chart: &str) {
        self.set(chart, Script::Empty);
    }
}

impl ChartFetcher for ScriptedFetcher {
    fn fetch_and_parse(&self, chart: &ChartDefinition) -> Result<Vec<ChartEntry>, FetchError> {
        let script = self.scripts.lock().unwrap().get(chart.key.as_str()).cloned();
        match script {
            Some(Script::Entries(entries)) => Ok(entries),
            Some(Script::Transport(message)) => Err(FetchError::Transport { message }),
            Some(Script::Parse(html)) => Err(FetchError::Parse {
                message: "No valid chart entries could be parsed from HTML".to_string(),
                payload: Some(html),
            }),
            Some(Script::Empty) => Err(FetchError::EmptyResult {
                payload: Some("<html><main></main></html>".to_string()),
            }),
            None => Err(FetchError::Transport {
                message: "no script".to_string(),
            }),
        }
    }
}

pub struct TestPipeline {
    pub dir: TempDir,
    pub db_path: PathBuf,
    pub debug_dir: PathBuf,
    pub charts: Vec<ChartDefinition>,
    pub store: Arc<SqliteSnapshotStore>,
    pub fetcher: Arc<ScriptedFetcher>,
}

#[allow(dead_code)]
impl TestPipeline {
    pub fn new(chart_keys: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("charts.db");
        let debug_dir = dir.path().join("debug");
        let store = Arc::new(SqliteSnapshotStore::new(&db_path).unwrap());
        let charts = chart_keys
            .iter()
            .map(|key| ChartDefinition::new(key, key, &format!("https://charts.test/{}", key)))
            .collect();
        Self {
            dir,
            db_path,
            debug_dir,
            charts,
            store,
            fetcher: Arc::new(ScriptedFetcher::default()),
        }
    }

    pub fn orchestrator(&self) -> IngestionOrchestrator {
        IngestionOrchestrator::new(
            self.fetcher.clone(),
            self.store.clone(),
            Arc::new(FileDiagnosticsSink::new(&self.debug_dir)),
        )
    }

    pub fn ingest(&self, week: &str) -> IngestReport {
        self.orchestrator().ingest(&self.charts, week.parse().unwrap())
    }

    pub fn engine(&self) -> MetricsEngine {
        MetricsEngine::new(self.store.clone(), MetricsSettings::default())
    }

    /// A fresh store on the same database file.
    pub fn reopen(&self) -> Arc<SqliteSnapshotStore> {
        Arc::new(SqliteSnapshotStore::new(&self.db_path).unwrap())
    }

    pub fn keys(&self) -> Vec<ChartKey> {
        self.charts.iter().map(|c| c.key.clone()).collect()
    }

    pub fn week(s: &str) -> Week {
        s.parse().unwrap()
    }
}
