//! Schema creation, verification, and ordered migrations (spec §4.A).

use rusqlite::Connection;
use tracing::info;

use telemetry_core::{Error, Result, CURRENT_SCHEMA_VERSION};

use crate::pragma::map_sqlite_err;

/// One migration step, applied in one transaction. Failure rolls back and
/// reports (spec §4.A `migrate(to_version)`).
struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

/// Ordered v1 -> v6 migrations, matching the original's one-file-per-version
/// pattern (`migrate_v5.py`, `migrate_v5_to_v6.py`) rather than a single
/// "create current schema" shortcut.
fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "create runs table (core fields)",
            sql: r#"
                CREATE TABLE IF NOT EXISTS runs (
                    event_id        TEXT PRIMARY KEY,
                    run_id          TEXT NOT NULL,
                    agent_name      TEXT NOT NULL,
                    job_type        TEXT NOT NULL,
                    trigger_type    TEXT NOT NULL,
                    start_time      TEXT NOT NULL,
                    end_time        TEXT,
                    status          TEXT NOT NULL,
                    duration_ms     INTEGER NOT NULL DEFAULT 0,
                    items_discovered INTEGER NOT NULL DEFAULT 0,
                    items_succeeded  INTEGER NOT NULL DEFAULT 0,
                    items_failed     INTEGER NOT NULL DEFAULT 0,
                    schema_version  INTEGER NOT NULL,
                    created_at      TEXT NOT NULL,
                    updated_at      TEXT NOT NULL
                );
            "#,
        },
        Migration {
            version: 2,
            description: "add payload columns (summaries, json docs)",
            sql: r#"
                ALTER TABLE runs ADD COLUMN input_summary TEXT;
                ALTER TABLE runs ADD COLUMN output_summary TEXT;
                ALTER TABLE runs ADD COLUMN error_summary TEXT;
                ALTER TABLE runs ADD COLUMN error_details TEXT;
                ALTER TABLE runs ADD COLUMN metrics_json TEXT;
                ALTER TABLE runs ADD COLUMN context_json TEXT;
            "#,
        },
        Migration {
            version: 3,
            description: "add taxonomy columns",
            sql: r#"
                ALTER TABLE runs ADD COLUMN product TEXT;
                ALTER TABLE runs ADD COLUMN platform TEXT;
                ALTER TABLE runs ADD COLUMN product_family TEXT;
                ALTER TABLE runs ADD COLUMN website TEXT;
                ALTER TABLE runs ADD COLUMN website_section TEXT;
                ALTER TABLE runs ADD COLUMN item_name TEXT;
            "#,
        },
        Migration {
            version: 4,
            description: "add git provenance columns",
            sql: r#"
                ALTER TABLE runs ADD COLUMN git_repo TEXT;
                ALTER TABLE runs ADD COLUMN git_branch TEXT;
                ALTER TABLE runs ADD COLUMN git_run_tag TEXT;
                ALTER TABLE runs ADD COLUMN git_commit_hash TEXT;
                ALTER TABLE runs ADD COLUMN git_commit_author TEXT;
                ALTER TABLE runs ADD COLUMN git_commit_timestamp TEXT;
                ALTER TABLE runs ADD COLUMN git_commit_source TEXT;
            "#,
        },
        Migration {
            version: 5,
            description: "add insight_id and run_events table",
            sql: r#"
                ALTER TABLE runs ADD COLUMN insight_id TEXT;
                CREATE TABLE IF NOT EXISTS run_events (
                    id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    run_id          TEXT NOT NULL,
                    event_type      TEXT NOT NULL,
                    timestamp       TEXT NOT NULL,
                    message         TEXT,
                    metadata_json   TEXT
                );
            "#,
        },
        Migration {
            version: 6,
            description: "create lookup indexes",
            sql: r#"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_runs_event_id ON runs(event_id);
                CREATE INDEX IF NOT EXISTS idx_runs_run_id ON runs(run_id);
                CREATE INDEX IF NOT EXISTS idx_runs_agent_name ON runs(agent_name);
                CREATE INDEX IF NOT EXISTS idx_runs_job_type ON runs(job_type);
                CREATE INDEX IF NOT EXISTS idx_runs_start_time ON runs(start_time);
                CREATE INDEX IF NOT EXISTS idx_runs_website ON runs(website, website_section);
                CREATE INDEX IF NOT EXISTS idx_runs_insight_id ON runs(insight_id);
                CREATE INDEX IF NOT EXISTS idx_run_events_run_id ON run_events(run_id);
            "#,
        },
    ]
}

const MIGRATIONS_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version     INTEGER PRIMARY KEY,
        description TEXT NOT NULL,
        applied_at  TEXT NOT NULL
    );
"#;

/// Idempotently create the schema: the `schema_migrations` table plus every
/// migration up to [`CURRENT_SCHEMA_VERSION`] (spec §4.A `create_schema`).
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(MIGRATIONS_TABLE_SQL).map_err(map_sqlite_err)?;
    migrate(conn, CURRENT_SCHEMA_VERSION)
}

/// Current schema version recorded in `schema_migrations`, or 0 if none
/// applied yet.
pub fn current_version(conn: &Connection) -> Result<i64> {
    conn.execute_batch(MIGRATIONS_TABLE_SQL).map_err(map_sqlite_err)?;
    let version: Option<i64> = conn
        .query_row(
            "SELECT MAX(version) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(map_sqlite_err)?;
    Ok(version.unwrap_or(0))
}

/// Apply ordered migrations up to `to_version`. Each migration runs in one
/// transaction; failure rolls back that migration and returns the error
/// (spec §4.A `migrate(to_version)`).
pub fn migrate(conn: &Connection, to_version: i64) -> Result<()> {
    conn.execute_batch(MIGRATIONS_TABLE_SQL).map_err(map_sqlite_err)?;
    let mut applied = current_version(conn)?;

    for m in migrations() {
        if m.version <= applied || m.version > to_version {
            continue;
        }
        let tx = conn.unchecked_transaction().map_err(map_sqlite_err)?;
        tx.execute_batch(m.sql).map_err(map_sqlite_err)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![m.version, m.description, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(map_sqlite_err)?;
        tx.commit().map_err(map_sqlite_err)?;
        applied = m.version;
        info!(version = m.version, description = m.description, "applied migration");
    }

    Ok(())
}

/// Diagnostic result of [`verify_schema`].
#[derive(Debug, Clone)]
pub struct SchemaVerification {
    pub ok: bool,
    pub messages: Vec<String>,
}

const REQUIRED_TABLES: &[&str] = &["runs", "run_events", "schema_migrations"];
const REQUIRED_RUN_COLUMNS: &[&str] = &[
    "event_id",
    "run_id",
    "agent_name",
    "job_type",
    "trigger_type",
    "start_time",
    "end_time",
    "status",
    "duration_ms",
    "items_discovered",
    "items_succeeded",
    "items_failed",
    "schema_version",
    "created_at",
    "updated_at",
    "insight_id",
];

/// Verify the schema matches what this version of the code expects,
/// returning diagnostic messages for anything missing or mismatched
/// (spec §4.A `verify_schema`).
pub fn verify_schema(conn: &Connection) -> Result<SchemaVerification> {
    let mut messages = Vec::new();

    for table in REQUIRED_TABLES {
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )
            .map_err(map_sqlite_err)?;
        if !exists {
            messages.push(format!("missing table: {table}"));
        }
    }

    if messages.is_empty() {
        let mut stmt = conn.prepare("PRAGMA table_info(runs)").map_err(map_sqlite_err)?;
        let existing: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(map_sqlite_err)?
            .filter_map(|r| r.ok())
            .collect();
        for col in REQUIRED_RUN_COLUMNS {
            if !existing.iter().any(|c| c == col) {
                messages.push(format!("missing column: runs.{col}"));
            }
        }
    }

    let version = current_version(conn)?;
    if version != CURRENT_SCHEMA_VERSION {
        messages.push(format!(
            "schema version mismatch: expected {CURRENT_SCHEMA_VERSION}, found {version}"
        ));
    }

    Ok(SchemaVerification {
        ok: messages.is_empty(),
        messages,
    })
}

/// Surface validation as a proper `Error` when verification fails, for
/// call sites that want fail-fast rather than a diagnostic list.
pub fn verify_schema_or_err(conn: &Connection) -> Result<()> {
    let v = verify_schema(conn)?;
    if v.ok {
        Ok(())
    } else {
        Err(Error::Corruption(v.messages.join("; ")))
    }
}
