use crate::chart::{ChartKey, Week};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Raw payloads kept per failed chart are capped at this many bytes.
pub const DEFAULT_MAX_ARTIFACT_BYTES: usize = 200_000;

/// Somewhere to put the raw payload of a failed fetch for later inspection.
///
/// Recording is best effort: a sink that cannot write returns `None` and
/// must never fail the ingestion it was called from.
pub trait DiagnosticsSink: Send + Sync {
    /// Returns a reference to the stored artifact (e.g. a file path).
    fn record(&self, chart: &ChartKey, week: Week, payload: &str) -> Option<String>;
}

/// Discards every payload.
pub struct NoopDiagnosticsSink;

impl DiagnosticsSink for NoopDiagnosticsSink {
    fn record(&self, _chart: &ChartKey, _week: Week, _payload: &str) -> Option<String> {
        None
    }
}

/// Writes payloads to `<dir>/<chart>_<week>.html`.
pub struct FileDiagnosticsSink {
    dir: PathBuf,
    max_bytes: usize,
}

impl FileDiagnosticsSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn artifact_path(&self, chart: &ChartKey, week: Week) -> PathBuf {
        self.dir.join(format!("{}_{}.html", chart, week))
    }
}

impl DiagnosticsSink for FileDiagnosticsSink {
    fn record(&self, chart: &ChartKey, week: Week, payload: &str) -> Option<String> {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!("Cannot create diagnostics dir {:?}: {}", self.dir, e);
            return None;
        }
        let path = self.artifact_path(chart, week);
        let mut cut = payload.len().min(self.max_bytes);
        while !payload.is_char_boundary(cut) {
            cut -= 1;
        }
        match fs::write(&path, &payload.as_bytes()[..cut]) {
            Ok(()) => {
                debug!("Wrote {} diagnostic bytes to {:?}", cut, path);
                Some(path.to_string_lossy().into_owned())
            }
            Err(e) => {
                warn!("Cannot write diagnostics artifact {:?}: {}", path, e);
                None
            }
        }
    }
}
