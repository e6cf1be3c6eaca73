use super::outcome::{ChartOutcome, IngestReport};
use crate::chart::{ChartDefinition, ChartEntry, ChartKey, Week};
use crate::fetch::{ChartFetcher, DiagnosticsSink, FetchError};
use crate::snapshot_store::{Snapshot, SnapshotFailure, SnapshotStore};
use chrono::Utc;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct IngestionOrchestrator {
    fetcher: Arc<dyn ChartFetcher>,
    store: Arc<dyn SnapshotStore>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    parallel_fetch: bool,
}

impl IngestionOrchestrator {
    pub fn new(
        fetcher: Arc<dyn ChartFetcher>,
        store: Arc<dyn SnapshotStore>,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            fetcher,
            store,
            diagnostics,
            parallel_fetch: false,
        }
    }

    /// Fetch all charts concurrently. Writes stay one chart at a time.
    pub fn with_parallel_fetch(mut self, parallel: bool) -> Self {
        self.parallel_fetch = parallel;
        self
    }

    /// Ingests every chart in `charts` for `week`.
    ///
    /// Never fails as a whole: each chart's fetch, classification and write
    /// is contained, and the report carries one outcome per chart.
    pub fn ingest(&self, charts: &[ChartDefinition], week: Week) -> IngestReport {
        info!(
            "Ingesting {} charts for week {} (parallel fetch: {})",
            charts.len(),
            week,
            self.parallel_fetch
        );

        let fetched: Vec<Result<Vec<ChartEntry>, FetchError>> = if self.parallel_fetch {
            charts
                .par_iter()
                .map(|chart| self.fetcher.fetch_and_parse(chart))
                .collect()
        } else {
            charts
                .iter()
                .map(|chart| self.fetcher.fetch_and_parse(chart))
                .collect()
        };

        let outcomes = charts
            .iter()
            .zip(fetched)
            .map(|(chart, result)| {
                let outcome = self.record(&chart.key, week, result);
                (chart.key.clone(), outcome)
            })
            .collect();

        let report = IngestReport { week, outcomes };
        info!(
            "Ingestion for week {} done: {} ok, {} not ok",
            week,
            report.ok_count(),
            report.failed_count()
        );
        report
    }

    fn record(
        &self,
        chart: &ChartKey,
        week: Week,
        result: Result<Vec<ChartEntry>, FetchError>,
    ) -> ChartOutcome {
        let fetched_at = Utc::now();
        let snapshot = match result.and_then(validate_entries) {
            Ok(entries) => {
                info!("Chart {} week {}: {} entries", chart, week, entries.len());
                Snapshot::ok(chart.clone(), week, fetched_at, entries)
            }
            Err(e) => {
                match &e {
                    FetchError::EmptyResult { .. } => {
                        warn!("Chart {} week {}: empty result", chart, week)
                    }
                    _ => error!("Chart {} week {}: {}", chart, week, e),
                }
                Snapshot::failed(chart.clone(), week, fetched_at, self.failure_for(chart, week, &e))
            }
        };

        let outcome = match snapshot.failure() {
            None => ChartOutcome::Ok {
                entries: snapshot.entries().map_or(0, |e| e.len()),
            },
            Some(failure) => ChartOutcome::Failed {
                kind: failure.kind,
                reason: failure.message.clone(),
            },
        };

        match self.store.upsert(&snapshot) {
            Ok(()) => outcome,
            Err(e) => {
                error!("Failed to store snapshot for chart {} week {}: {}", chart, week, e);
                ChartOutcome::NotRecorded {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn failure_for(&self, chart: &ChartKey, week: Week, e: &FetchError) -> SnapshotFailure {
        let mut failure = SnapshotFailure::new(e.kind(), &e.to_string());
        if let Some(payload) = e.payload() {
            failure = failure
                .with_payload_bytes(payload.len() as u64)
                .with_debug_artifact(self.diagnostics.record(chart, week, payload));
        }
        failure
    }
}

/// Rejects entry lists the snapshot store could not hold as one chart.
fn validate_entries(entries: Vec<ChartEntry>) -> Result<Vec<ChartEntry>, FetchError> {
    if entries.is_empty() {
        return Err(FetchError::EmptyResult { payload: None });
    }
    let mut ranks = HashSet::new();
    let mut tracks = HashSet::new();
    for entry in &entries {
        let problem = if entry.rank == 0 {
            Some(format!("rank 0 for '{}'", entry.title))
        } else if !ranks.insert(entry.rank) {
            Some(format!("duplicate rank {}", entry.rank))
        } else if !tracks.insert(&entry.track_id) {
            Some(format!("duplicate track '{}'", entry.display_name()))
        } else {
            None
        };
        if let Some(message) = problem {
            return Err(FetchError::Parse {
                message,
                payload: None,
            });
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::NoopDiagnosticsSink;
    use crate::snapshot_store::{FailureKind, SqliteSnapshotStore, StoreError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone)]
    enum Scripted {
        Entries(usize),
        Empty,
        Parse,
        Transport,
    }

    struct ScriptedFetcher {
        script: HashMap<String, Scripted>,
    }

    impl ScriptedFetcher {
        fn new(script: &[(&str, Scripted)]) -> Self {
            Self {
                script: script
                    .iter()
                    .map(|(k, s)| (k.to_string(), s.clone()))
                    .collect(),
            }
        }
    }

    fn entries(n: usize) -> Vec<ChartEntry> {
        (1..=n)
            .map(|i| {
                ChartEntry::new(
                    i as u32,
                    &format!("Song {}", i),
                    None,
                    vec!["Artist".to_string()],
                    vec![],
                )
            })
            .collect()
    }

    impl ChartFetcher for ScriptedFetcher {
        fn fetch_and_parse(&self, chart: &ChartDefinition) -> Result<Vec<ChartEntry>, FetchError> {
            match self.script.get(chart.key.as_str()) {
                Some(Scripted::Entries(n)) => Ok(entries(*n)),
                Some(Scripted::Empty) => Err(FetchError::EmptyResult {
                    payload: Some("<html></html>".to_string()),
                }),
                Some(Scripted::Parse) => Err(FetchError::Parse {
                    message: "layout changed".to_string(),
                    payload: Some("<html>changed</html>".to_string()),
                }),
                Some(Scripted::Transport) | None => Err(FetchError::Transport {
                    message: "connection reset".to_string(),
                }),
            }
        }
    }

    /// Fails every write for the charts listed in `failing`.
    struct FlakyStore {
        inner: SqliteSnapshotStore,
        failing: Vec<String>,
    }

    impl SnapshotStore for FlakyStore {
        fn upsert(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
            if self.failing.iter().any(|k| k == snapshot.chart.as_str()) {
                return Err(StoreError::Corrupt("disk full".to_string()));
            }
            self.inner.upsert(snapshot)
        }
        fn history(&self, chart: &ChartKey, through: Week) -> Result<Vec<Snapshot>, StoreError> {
            self.inner.history(chart, through)
        }
        fn latest(&self, chart: &ChartKey) -> Result<Option<Snapshot>, StoreError> {
            self.inner.latest(chart)
        }
        fn latest_through(
            &self,
            chart: &ChartKey,
            through: Week,
        ) -> Result<Option<Snapshot>, StoreError> {
            self.inner.latest_through(chart, through)
        }
        fn charts(&self) -> Result<Vec<ChartKey>, StoreError> {
            self.inner.charts()
        }
        fn latest_week(&self) -> Result<Option<Week>, StoreError> {
            self.inner.latest_week()
        }
    }

    /// Remembers which payloads it was handed and returns a fake reference.
    #[derive(Default)]
    struct RecordingSink {
        recorded: Mutex<Vec<String>>,
    }

    impl DiagnosticsSink for RecordingSink {
        fn record(&self, chart: &ChartKey, week: Week, _payload: &str) -> Option<String> {
            let reference = format!("mem://{}_{}", chart, week);
            self.recorded.lock().unwrap().push(reference.clone());
            Some(reference)
        }
    }

    fn charts(n: usize) -> Vec<ChartDefinition> {
        (0..n)
            .map(|i| {
                ChartDefinition::new(
                    &format!("chart-{}", i),
                    &format!("Chart {}", i),
                    &format!("https://example.test/{}", i),
                )
            })
            .collect()
    }

    fn week() -> Week {
        "2026-01-05".parse().unwrap()
    }

    fn orchestrator(
        fetcher: ScriptedFetcher,
        store: Arc<dyn SnapshotStore>,
    ) -> IngestionOrchestrator {
        IngestionOrchestrator::new(Arc::new(fetcher), store, Arc::new(NoopDiagnosticsSink))
    }

    #[test]
    fn test_one_failing_chart_never_affects_the_others() {
        for n in 2..=5 {
            for k in 0..n {
                for failure in [Scripted::Empty, Scripted::Parse, Scripted::Transport] {
                    let defs = charts(n);
                    let script: Vec<(&str, Scripted)> = defs
                        .iter()
                        .enumerate()
                        .map(|(i, c)| {
                            let s = if i == k {
                                failure.clone()
                            } else {
                                Scripted::Entries(10 + i)
                            };
                            (c.key.as_str(), s)
                        })
                        .collect();
                    let store = Arc::new(SqliteSnapshotStore::open_in_memory().unwrap());
                    let orch = orchestrator(ScriptedFetcher::new(&script), store.clone())
                        .with_parallel_fetch(n % 2 == 0);

                    let report = orch.ingest(&defs, week());

                    assert_eq!(report.outcomes.len(), n);
                    for (i, def) in defs.iter().enumerate() {
                        let stored = store.latest(&def.key).unwrap().unwrap();
                        assert_eq!(stored.week, week());
                        if i == k {
                            assert!(!stored.is_ok());
                            assert!(!report.outcome(&def.key).unwrap().is_ok());
                        } else {
                            assert_eq!(stored.entries().unwrap().len(), 10 + i);
                            assert_eq!(
                                report.outcome(&def.key),
                                Some(&ChartOutcome::Ok { entries: 10 + i })
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_storage_failure_is_contained() {
        let defs = charts(3);
        let inner = SqliteSnapshotStore::open_in_memory().unwrap();
        let store = Arc::new(FlakyStore {
            inner,
            failing: vec!["chart-1".to_string()],
        });
        let script = [
            ("chart-0", Scripted::Entries(5)),
            ("chart-1", Scripted::Entries(5)),
            ("chart-2", Scripted::Transport),
        ];
        let report = orchestrator(ScriptedFetcher::new(&script), store.clone()).ingest(&defs, week());

        assert!(matches!(
            report.outcome(&ChartKey::new("chart-1")),
            Some(ChartOutcome::NotRecorded { .. })
        ));
        assert!(store.latest(&ChartKey::new("chart-1")).unwrap().is_none());
        assert!(store.latest(&ChartKey::new("chart-0")).unwrap().unwrap().is_ok());
        let failed = store.latest(&ChartKey::new("chart-2")).unwrap().unwrap();
        assert_eq!(failed.failure().unwrap().kind, FailureKind::Transport);
    }

    #[test]
    fn test_rerun_turns_failed_into_ok_without_touching_siblings() {
        let defs = charts(2);
        let store = Arc::new(SqliteSnapshotStore::open_in_memory().unwrap());

        let first = [("chart-0", Scripted::Entries(3)), ("chart-1", Scripted::Parse)];
        orchestrator(ScriptedFetcher::new(&first), store.clone()).ingest(&defs, week());
        let sibling_before = store.latest(&ChartKey::new("chart-0")).unwrap().unwrap();

        let second = [("chart-0", Scripted::Entries(3)), ("chart-1", Scripted::Entries(7))];
        orchestrator(ScriptedFetcher::new(&second), store.clone()).ingest(&defs[1..], week());

        let repaired = store.latest(&ChartKey::new("chart-1")).unwrap().unwrap();
        assert_eq!(repaired.entries().unwrap().len(), 7);
        assert_eq!(
            store.latest(&ChartKey::new("chart-0")).unwrap().unwrap(),
            sibling_before
        );
        assert_eq!(store.history(&ChartKey::new("chart-1"), week()).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_result_is_recorded_as_failure_with_diagnostics() {
        let defs = charts(1);
        let store = Arc::new(SqliteSnapshotStore::open_in_memory().unwrap());
        let sink = Arc::new(RecordingSink::default());
        let orch = IngestionOrchestrator::new(
            Arc::new(ScriptedFetcher::new(&[("chart-0", Scripted::Empty)])),
            store.clone(),
            sink.clone(),
        );

        let report = orch.ingest(&defs, week());

        assert!(matches!(
            report.outcome(&ChartKey::new("chart-0")),
            Some(ChartOutcome::Failed {
                kind: FailureKind::EmptyResult,
                ..
            })
        ));
        let stored = store.latest(&ChartKey::new("chart-0")).unwrap().unwrap();
        let failure = stored.failure().unwrap();
        assert_eq!(failure.payload_bytes, Some("<html></html>".len() as u64));
        assert_eq!(
            failure.debug_artifact.as_deref(),
            Some("mem://chart-0_2026-01-05")
        );
        assert_eq!(sink.recorded.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unavailable_diagnostics_sink_does_not_change_outcome() {
        let defs = charts(1);
        let store = Arc::new(SqliteSnapshotStore::open_in_memory().unwrap());
        let report = orchestrator(
            ScriptedFetcher::new(&[("chart-0", Scripted::Parse)]),
            store.clone(),
        )
        .ingest(&defs, week());

        assert!(matches!(
            report.outcome(&ChartKey::new("chart-0")),
            Some(ChartOutcome::Failed {
                kind: FailureKind::Parse,
                ..
            })
        ));
        let stored = store.latest(&ChartKey::new("chart-0")).unwrap().unwrap();
        assert_eq!(stored.failure().unwrap().debug_artifact, None);
        assert!(stored.failure().unwrap().payload_bytes.is_some());
    }

    #[test]
    fn test_duplicate_ranks_are_a_parse_failure() {
        let mut list = entries(3);
        list[2].rank = 2;
        let err = validate_entries(list).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Parse);
        assert!(err.to_string().contains("duplicate rank 2"));

        let mut list = entries(2);
        list[0].rank = 0;
        assert_eq!(validate_entries(list).unwrap_err().kind(), FailureKind::Parse);

        assert_eq!(
            validate_entries(vec![]).unwrap_err().kind(),
            FailureKind::EmptyResult
        );
    }

    #[test]
    fn test_same_title_link_entries_are_ingested() {
        let html = r#"<a href="/track/closer/101">Closer</a><a href="/track/closer/202">Closer</a><a href="/track/other/303">Other</a>"#;
        let parsed = crate::fetch::parse_chart(html, 100).unwrap();
        assert_eq!(validate_entries(parsed.clone()).unwrap().len(), 3);

        let mut duplicated = parsed;
        duplicated[1].track_id = duplicated[0].track_id.clone();
        let err = validate_entries(duplicated).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Parse);
        assert!(err.to_string().contains("duplicate track"));
    }
}
