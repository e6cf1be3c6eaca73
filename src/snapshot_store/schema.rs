//! SQLite schema for the snapshot database.
//!
//! - chart_snapshots: one row per (chart, week) attempt, ok or failed
//! - chart_entries: ranked rows of ok snapshots

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, ForeignKey, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Snapshots and entries
// =============================================================================

const CHART_SNAPSHOTS_TABLE_V1: Table = Table {
    name: "chart_snapshots",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("chart_key", &SqlType::Text, non_null = true),
        sqlite_column!("week", &SqlType::Text, non_null = true), // Monday, YYYY-MM-DD
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("fetched_at", &SqlType::Text, non_null = true), // RFC 3339
        sqlite_column!("error_kind", &SqlType::Text),
        sqlite_column!("error_message", &SqlType::Text),
        sqlite_column!("payload_bytes", &SqlType::Integer),
        sqlite_column!("debug_artifact", &SqlType::Text),
    ],
    indices: &[("idx_chart_snapshots_chart_week", "chart_key, week")],
    unique_constraints: &[&["chart_key", "week"]],
};

const SNAPSHOT_FK: ForeignKey = ForeignKey {
    foreign_table: "chart_snapshots",
    foreign_column: "id",
};

const CHART_ENTRIES_TABLE_V1: Table = Table {
    name: "chart_entries",
    columns: &[
        sqlite_column!(
            "snapshot_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SNAPSHOT_FK)
        ),
        sqlite_column!("rank", &SqlType::Integer, non_null = true),
        sqlite_column!("track_id", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("mix_name", &SqlType::Text),
        sqlite_column!("artists", &SqlType::Text, non_null = true), // JSON array
        sqlite_column!("remixers", &SqlType::Text, non_null = true), // JSON array
        sqlite_column!("url", &SqlType::Text),
    ],
    indices: &[("idx_chart_entries_track", "track_id")],
    unique_constraints: &[&["snapshot_id", "rank"], &["snapshot_id", "track_id"]],
};

pub const SNAPSHOT_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[CHART_SNAPSHOTS_TABLE_V1, CHART_ENTRIES_TABLE_V1],
    migration: None,
}];
