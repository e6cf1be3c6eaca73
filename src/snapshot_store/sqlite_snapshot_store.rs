use super::error::StoreError;
use super::models::{FailureKind, Snapshot, SnapshotFailure, SnapshotState, SnapshotStatus};
use super::schema::SNAPSHOT_VERSIONED_SCHEMAS;
use super::SnapshotStore;
use crate::chart::{ChartEntry, ChartKey, TrackId, Week};
use crate::sqlite_persistence::{apply_schemas, open_versioned};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

pub struct SqliteSnapshotStore {
    conn: Arc<Mutex<Connection>>,
}

/// Snapshot row as read from SQLite, before status/kind decoding.
struct SnapshotRow {
    id: i64,
    chart_key: String,
    week: String,
    status: String,
    fetched_at: String,
    error_kind: Option<String>,
    error_message: Option<String>,
    payload_bytes: Option<i64>,
    debug_artifact: Option<String>,
}

struct EntryRow {
    snapshot_id: i64,
    rank: i64,
    track_id: String,
    title: String,
    mix_name: Option<String>,
    artists: String,
    remixers: String,
    url: Option<String>,
}

const SNAPSHOT_COLUMNS: &str = "id, chart_key, week, status, fetched_at, error_kind, error_message, payload_bytes, debug_artifact";

impl SqliteSnapshotStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let path = db_path.as_ref();
        info!("Opening snapshot database at {:?}", path);
        let conn = open_versioned(path, SNAPSHOT_VERSIONED_SCHEMAS, "snapshot")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        apply_schemas(&mut conn, SNAPSHOT_VERSIONED_SCHEMAS, "snapshot")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn row_to_snapshot_row(row: &rusqlite::Row) -> rusqlite::Result<SnapshotRow> {
        Ok(SnapshotRow {
            id: row.get("id")?,
            chart_key: row.get("chart_key")?,
            week: row.get("week")?,
            status: row.get("status")?,
            fetched_at: row.get("fetched_at")?,
            error_kind: row.get("error_kind")?,
            error_message: row.get("error_message")?,
            payload_bytes: row.get("payload_bytes")?,
            debug_artifact: row.get("debug_artifact")?,
        })
    }

    fn row_to_entry_row(row: &rusqlite::Row) -> rusqlite::Result<EntryRow> {
        Ok(EntryRow {
            snapshot_id: row.get("snapshot_id")?,
            rank: row.get("rank")?,
            track_id: row.get("track_id")?,
            title: row.get("title")?,
            mix_name: row.get("mix_name")?,
            artists: row.get("artists")?,
            remixers: row.get("remixers")?,
            url: row.get("url")?,
        })
    }

    fn decode_entry(row: EntryRow) -> Result<ChartEntry, StoreError> {
        let rank = u32::try_from(row.rank)
            .ok()
            .filter(|r| *r > 0)
            .ok_or_else(|| StoreError::Corrupt(format!("invalid rank {}", row.rank)))?;
        Ok(ChartEntry {
            rank,
            track_id: TrackId::from_stored(row.track_id),
            title: row.title,
            mix_name: row.mix_name,
            artists: serde_json::from_str(&row.artists)?,
            remixers: serde_json::from_str(&row.remixers)?,
            url: row.url,
        })
    }

    fn decode_snapshot(row: SnapshotRow, entries: Vec<ChartEntry>) -> Result<Snapshot, StoreError> {
        let week: Week = row
            .week
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("snapshot {}: {}", row.id, e)))?;
        let fetched_at = DateTime::parse_from_rfc3339(&row.fetched_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Corrupt(format!("snapshot {} fetched_at: {}", row.id, e)))?;
        let status = SnapshotStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Corrupt(format!("snapshot {} has unknown status '{}'", row.id, row.status))
        })?;

        let state = match status {
            SnapshotStatus::Ok => SnapshotState::Ok { entries },
            SnapshotStatus::Failed => {
                let kind_raw = row.error_kind.unwrap_or_default();
                let kind = FailureKind::parse(&kind_raw).ok_or_else(|| {
                    StoreError::Corrupt(format!(
                        "snapshot {} has unknown error kind '{}'",
                        row.id, kind_raw
                    ))
                })?;
                SnapshotState::Failed(SnapshotFailure {
                    kind,
                    message: row.error_message.unwrap_or_default(),
                    payload_bytes: row.payload_bytes.map(|b| b.max(0) as u64),
                    debug_artifact: row.debug_artifact,
                })
            }
        };

        Ok(Snapshot {
            chart: ChartKey::new(row.chart_key),
            week,
            fetched_at,
            state,
        })
    }

    /// Entries of every ok snapshot of `chart` up to `through`, keyed by snapshot id.
    fn load_entries(
        conn: &Connection,
        chart: &ChartKey,
        through: Option<Week>,
    ) -> Result<HashMap<i64, Vec<ChartEntry>>, StoreError> {
        let through = through.map(|w| w.to_string());
        let mut stmt = conn.prepare(
            "SELECT e.snapshot_id AS snapshot_id, e.rank AS rank, e.track_id AS track_id,
                    e.title AS title, e.mix_name AS mix_name, e.artists AS artists,
                    e.remixers AS remixers, e.url AS url
             FROM chart_entries e
             JOIN chart_snapshots s ON s.id = e.snapshot_id
             WHERE s.chart_key = ?1 AND (?2 IS NULL OR s.week <= ?2) AND s.status = 'ok'
             ORDER BY e.snapshot_id, e.rank",
        )?;
        let rows = stmt
            .query_map(params![chart.as_str(), through], Self::row_to_entry_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut grouped: HashMap<i64, Vec<ChartEntry>> = HashMap::new();
        for row in rows {
            let snapshot_id = row.snapshot_id;
            grouped
                .entry(snapshot_id)
                .or_default()
                .push(Self::decode_entry(row)?);
        }
        Ok(grouped)
    }

    fn load_entries_for(conn: &Connection, snapshot_id: i64) -> Result<Vec<ChartEntry>, StoreError> {
        let mut stmt = conn.prepare(
            "SELECT snapshot_id, rank, track_id, title, mix_name, artists, remixers, url
             FROM chart_entries WHERE snapshot_id = ?1 ORDER BY rank",
        )?;
        let rows = stmt
            .query_map(params![snapshot_id], Self::row_to_entry_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(Self::decode_entry).collect()
    }

    fn latest_row(
        conn: &Connection,
        chart: &ChartKey,
        through: Option<Week>,
    ) -> Result<Option<Snapshot>, StoreError> {
        let through = through.map(|w| w.to_string());
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM chart_snapshots
                     WHERE chart_key = ?1 AND (?2 IS NULL OR week <= ?2)
                     ORDER BY week DESC LIMIT 1",
                    SNAPSHOT_COLUMNS
                ),
                params![chart.as_str(), through],
                Self::row_to_snapshot_row,
            )
            .optional()?;
        match row {
            None => Ok(None),
            Some(row) => {
                let entries = if row.status == SnapshotStatus::Ok.as_str() {
                    Self::load_entries_for(conn, row.id)?
                } else {
                    Vec::new()
                };
                Self::decode_snapshot(row, entries).map(Some)
            }
        }
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn upsert(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let week = snapshot.week.to_string();
        let fetched_at = snapshot
            .fetched_at
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let failure = snapshot.failure();

        tx.execute(
            "INSERT INTO chart_snapshots (
                chart_key, week, status, fetched_at,
                error_kind, error_message, payload_bytes, debug_artifact
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(chart_key, week) DO UPDATE SET
                status = excluded.status,
                fetched_at = excluded.fetched_at,
                error_kind = excluded.error_kind,
                error_message = excluded.error_message,
                payload_bytes = excluded.payload_bytes,
                debug_artifact = excluded.debug_artifact",
            params![
                snapshot.chart.as_str(),
                week,
                snapshot.status().as_str(),
                fetched_at,
                failure.map(|f| f.kind.as_str()),
                failure.map(|f| f.message.as_str()),
                failure.and_then(|f| f.payload_bytes).map(|b| b as i64),
                failure.and_then(|f| f.debug_artifact.as_deref()),
            ],
        )?;

        let snapshot_id: i64 = tx.query_row(
            "SELECT id FROM chart_snapshots WHERE chart_key = ?1 AND week = ?2",
            params![snapshot.chart.as_str(), week],
            |row| row.get(0),
        )?;

        // The entry list is replaced wholesale; a failed write leaves none behind.
        tx.execute(
            "DELETE FROM chart_entries WHERE snapshot_id = ?1",
            params![snapshot_id],
        )?;

        if let Some(entries) = snapshot.entries() {
            let mut stmt = tx.prepare(
                "INSERT INTO chart_entries (
                    snapshot_id, rank, track_id, title, mix_name, artists, remixers, url
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    snapshot_id,
                    entry.rank as i64,
                    entry.track_id.as_str(),
                    entry.title,
                    entry.mix_name,
                    serde_json::to_string(&entry.artists)?,
                    serde_json::to_string(&entry.remixers)?,
                    entry.url,
                ])?;
            }
        }

        tx.commit()?;
        debug!(
            "Upserted snapshot {} {} ({})",
            snapshot.chart,
            snapshot.week,
            snapshot.status().as_str()
        );
        Ok(())
    }

    fn history(&self, chart: &ChartKey, through: Week) -> Result<Vec<Snapshot>, StoreError> {
        let conn = self.lock()?;
        let mut entries = Self::load_entries(&conn, chart, Some(through))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM chart_snapshots
             WHERE chart_key = ?1 AND week <= ?2
             ORDER BY week ASC",
            SNAPSHOT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(
                params![chart.as_str(), through.to_string()],
                Self::row_to_snapshot_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|row| {
                let snapshot_entries = entries.remove(&row.id).unwrap_or_default();
                Self::decode_snapshot(row, snapshot_entries)
            })
            .collect()
    }

    fn latest(&self, chart: &ChartKey) -> Result<Option<Snapshot>, StoreError> {
        let conn = self.lock()?;
        Self::latest_row(&conn, chart, None)
    }

    fn latest_through(&self, chart: &ChartKey, through: Week) -> Result<Option<Snapshot>, StoreError> {
        let conn = self.lock()?;
        Self::latest_row(&conn, chart, Some(through))
    }

    fn charts(&self) -> Result<Vec<ChartKey>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT chart_key FROM chart_snapshots ORDER BY chart_key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys.into_iter().map(ChartKey::new).collect())
    }

    fn latest_week(&self) -> Result<Option<Week>, StoreError> {
        let conn = self.lock()?;
        let raw: Option<String> =
            conn.query_row("SELECT MAX(week) FROM chart_snapshots", [], |row| row.get(0))?;
        raw.map(|w| {
            w.parse()
                .map_err(|e| StoreError::Corrupt(format!("latest week: {}", e)))
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn week(s: &str) -> Week {
        s.parse().unwrap()
    }

    fn fetched() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 6, 0, 0).unwrap()
    }

    fn entries(titles: &[&str]) -> Vec<ChartEntry> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| ChartEntry::new(i as u32 + 1, t, None, vec!["Artist".to_string()], vec![]))
            .collect()
    }

    fn ok(chart: &str, w: &str, titles: &[&str]) -> Snapshot {
        Snapshot::ok(ChartKey::new(chart), week(w), fetched(), entries(titles))
    }

    fn failed(chart: &str, w: &str, kind: FailureKind) -> Snapshot {
        Snapshot::failed(
            ChartKey::new(chart),
            week(w),
            fetched(),
            SnapshotFailure::new(kind, "boom").with_payload_bytes(1234),
        )
    }

    fn count_rows(store: &SqliteSnapshotStore, chart: &str, w: &str) -> i64 {
        let conn = store.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM chart_snapshots WHERE chart_key = ?1 AND week = ?2",
            params![chart, w],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_upsert_and_read_back_ok_snapshot() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        let snapshot = ok("house", "2026-01-05", &["A", "B", "C"]);
        store.upsert(&snapshot).unwrap();

        let history = store.history(&ChartKey::new("house"), week("2026-01-05")).unwrap();
        assert_eq!(history, vec![snapshot]);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        let snapshot = ok("house", "2026-01-05", &["A", "B"]);
        store.upsert(&snapshot).unwrap();
        let first = store.history(&ChartKey::new("house"), week("2026-01-05")).unwrap();
        store.upsert(&snapshot).unwrap();
        let second = store.history(&ChartKey::new("house"), week("2026-01-05")).unwrap();

        assert_eq!(first, second);
        assert_eq!(count_rows(&store, "house", "2026-01-05"), 1);
    }

    #[test]
    fn test_rerun_turns_failed_into_ok_without_touching_siblings() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        store.upsert(&failed("house", "2026-01-05", FailureKind::Transport)).unwrap();
        store.upsert(&ok("techno", "2026-01-05", &["T"])).unwrap();

        store.upsert(&ok("house", "2026-01-05", &["A"])).unwrap();

        let house = store.latest(&ChartKey::new("house")).unwrap().unwrap();
        assert!(house.is_ok());
        assert_eq!(house.entries().unwrap().len(), 1);
        let techno = store.latest(&ChartKey::new("techno")).unwrap().unwrap();
        assert_eq!(techno, ok("techno", "2026-01-05", &["T"]));
    }

    #[test]
    fn test_ok_to_failed_overwrite_drops_entries() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        store.upsert(&ok("house", "2026-01-05", &["A", "B"])).unwrap();
        store.upsert(&failed("house", "2026-01-05", FailureKind::Parse)).unwrap();

        let conn = store.lock().unwrap();
        let entries: i64 = conn
            .query_row("SELECT COUNT(*) FROM chart_entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(entries, 0);
    }

    #[test]
    fn test_failed_snapshot_keeps_diagnostics() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        let snapshot = Snapshot::failed(
            ChartKey::new("hype"),
            week("2026-01-05"),
            fetched(),
            SnapshotFailure::new(FailureKind::EmptyResult, "Empty results (count=0)")
                .with_payload_bytes(52_000)
                .with_debug_artifact(Some("debug/hype_2026-01-05.html".to_string())),
        );
        store.upsert(&snapshot).unwrap();

        let loaded = store.latest(&ChartKey::new("hype")).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        let failure = loaded.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::EmptyResult);
        assert_eq!(failure.payload_bytes, Some(52_000));
    }

    #[test]
    fn test_history_is_ascending_and_bounded() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        store.upsert(&ok("house", "2026-01-19", &["C"])).unwrap();
        store.upsert(&ok("house", "2026-01-05", &["A"])).unwrap();
        store.upsert(&failed("house", "2026-01-12", FailureKind::Transport)).unwrap();
        store.upsert(&ok("techno", "2026-01-12", &["T"])).unwrap();

        let history = store.history(&ChartKey::new("house"), week("2026-01-12")).unwrap();
        let weeks: Vec<String> = history.iter().map(|s| s.week.to_string()).collect();
        assert_eq!(weeks, vec!["2026-01-05", "2026-01-12"]);
        assert!(history[0].is_ok());
        assert!(!history[1].is_ok());
    }

    #[test]
    fn test_latest_and_latest_through() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        assert!(store.latest(&ChartKey::new("house")).unwrap().is_none());
        assert!(store.latest_week().unwrap().is_none());

        store.upsert(&ok("house", "2026-01-05", &["A"])).unwrap();
        store.upsert(&failed("house", "2026-01-12", FailureKind::Parse)).unwrap();

        let latest = store.latest(&ChartKey::new("house")).unwrap().unwrap();
        assert_eq!(latest.week, week("2026-01-12"));
        let earlier = store
            .latest_through(&ChartKey::new("house"), week("2026-01-05"))
            .unwrap()
            .unwrap();
        assert_eq!(earlier.week, week("2026-01-05"));
        assert_eq!(store.latest_week().unwrap(), Some(week("2026-01-12")));
        assert_eq!(store.charts().unwrap(), vec![ChartKey::new("house")]);
    }

    #[test]
    fn test_duplicate_rank_rejected_and_rolled_back() {
        let store = SqliteSnapshotStore::open_in_memory().unwrap();
        store.upsert(&ok("house", "2026-01-05", &["A"])).unwrap();

        let mut bad = entries(&["X", "Y"]);
        bad[1].rank = 1;
        let snapshot = Snapshot::ok(ChartKey::new("house"), week("2026-01-05"), fetched(), bad);
        assert!(matches!(store.upsert(&snapshot), Err(StoreError::Sqlite(_))));

        // The previous ok snapshot survives the failed write.
        let latest = store.latest(&ChartKey::new("house")).unwrap().unwrap();
        assert_eq!(latest, ok("house", "2026-01-05", &["A"]));
    }

    #[test]
    fn test_concurrent_reruns_keep_one_row_per_chart_week() {
        let store = Arc::new(SqliteSnapshotStore::open_in_memory().unwrap());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let snapshot = if i % 2 == 0 {
                        ok("house", "2026-01-05", &["A", "B"])
                    } else {
                        failed("house", "2026-01-05", FailureKind::Transport)
                    };
                    store.upsert(&snapshot).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(count_rows(&store, "house", "2026-01-05"), 1);
        assert_eq!(
            store.history(&ChartKey::new("house"), week("2026-01-05")).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_reopen_on_disk_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("snapshots.db");
        {
            let store = SqliteSnapshotStore::new(&path).unwrap();
            store.upsert(&ok("house", "2026-01-05", &["A"])).unwrap();
        }
        let store = SqliteSnapshotStore::new(&path).unwrap();
        assert_eq!(store.charts().unwrap(), vec![ChartKey::new("house")]);
    }
}
