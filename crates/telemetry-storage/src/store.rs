//! The embedded relational store (spec §4.A).

use std::path::{Path, PathBuf};

use rusqlite::backup::Backup;
use rusqlite::Connection;
use tracing::{info, warn};

use telemetry_core::{Error, Result};

use crate::pragma::{apply_and_verify, map_sqlite_err, PragmaConfig, PragmaObservation};
use crate::schema::{self, SchemaVerification};

/// Integrity check depth (spec §4.A `integrity_check(quick|full)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityDepth {
    Quick,
    Full,
}

/// Result of an integrity check.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub ok: bool,
    pub message: String,
}

/// A connection to the embedded store file, configured per spec §4.A.
///
/// A `Store` wraps exactly one `rusqlite::Connection`. The crate
/// deliberately does not decide here whether that connection is "the"
/// writer or "a" reader — `telemetry-concurrency` serializes write access
/// to one `Store`, while `telemetry-engine`'s query side opens additional
/// independent `Store`s against the same path for concurrent reads (spec
/// §5: "QueryEngine uses multiple reader connections... readers do not
/// block on each other").
pub struct Store {
    conn: Connection,
    path: PathBuf,
}

impl Store {
    /// Open (creating if absent) the store file at `path`, apply the
    /// required pragma set, and ensure the schema is at least created.
    pub fn open(path: impl AsRef<Path>, pragma: &PragmaConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(map_sqlite_err)?;
        apply_and_verify(&conn, pragma)?;
        schema::create_schema(&conn)?;
        Ok(Store { conn, path })
    }

    /// Open a reader connection — same pragmas minus the write-amplifying
    /// ones that are database-wide anyway, but still worth re-asserting
    /// `busy_timeout` since that one is per-connection.
    pub fn open_reader(path: impl AsRef<Path>, pragma: &PragmaConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(map_sqlite_err)?;
        conn.busy_timeout(std::time::Duration::from_millis(pragma.busy_timeout_ms as u64))
            .map_err(map_sqlite_err)?;
        Ok(Store { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn verify_schema(&self) -> Result<SchemaVerification> {
        schema::verify_schema(&self.conn)
    }

    pub fn migrate(&self, to_version: i64) -> Result<()> {
        schema::migrate(&self.conn, to_version)
    }

    pub fn pragma_report(&self, cfg: &PragmaConfig) -> Result<Vec<PragmaObservation>> {
        crate::pragma::pragma_report(&self.conn, cfg)
    }

    /// Run the engine's integrity verification (spec §4.A
    /// `integrity_check`).
    pub fn integrity_check(&self, depth: IntegrityDepth) -> Result<IntegrityReport> {
        let pragma_name = match depth {
            IntegrityDepth::Quick => "quick_check",
            IntegrityDepth::Full => "integrity_check",
        };
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA {pragma_name}"))
            .map_err(map_sqlite_err)?;
        let rows: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(map_sqlite_err)?
            .filter_map(|r| r.ok())
            .collect();

        let ok = rows.len() == 1 && rows[0] == "ok";
        let message = if ok {
            "ok".to_string()
        } else {
            rows.join("; ")
        };
        if !ok {
            warn!(message = %message, "integrity check reported problems");
        }
        Ok(IntegrityReport { ok, message })
    }

    /// Produce a consistent copy using SQLite's online backup API, verify
    /// the copy's integrity, and delete it on verification failure (spec
    /// §4.A `backup`).
    pub fn backup(&self, target_path: impl AsRef<Path>) -> Result<()> {
        let target_path = target_path.as_ref();
        {
            let mut dst = Connection::open(target_path).map_err(map_sqlite_err)?;
            let backup = Backup::new(&self.conn, &mut dst).map_err(map_sqlite_err)?;
            backup
                .run_to_completion(5, std::time::Duration::from_millis(250), None)
                .map_err(map_sqlite_err)?;
        }

        let verify_conn = Connection::open(target_path).map_err(map_sqlite_err)?;
        let verify_store = Store {
            conn: verify_conn,
            path: target_path.to_path_buf(),
        };
        let report = verify_store.integrity_check(IntegrityDepth::Full)?;
        drop(verify_store);

        if !report.ok {
            warn!(target = %target_path.display(), message = %report.message, "backup failed verification, deleting copy");
            let _ = std::fs::remove_file(target_path);
            return Err(Error::Corruption(format!(
                "backup verification failed: {}",
                report.message
            )));
        }

        info!(target = %target_path.display(), "backup verified");
        Ok(())
    }

    /// No-op in DELETE journal mode; flushes WAL otherwise (spec §4.A
    /// `checkpoint`).
    pub fn checkpoint(&self) -> Result<()> {
        let journal_mode: String = self
            .conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .map_err(map_sqlite_err)?;
        if journal_mode.eq_ignore_ascii_case("wal") {
            self.conn
                .pragma_update(None, "wal_checkpoint", "TRUNCATE")
                .map_err(map_sqlite_err)?;
        }
        Ok(())
    }

    /// Engine-level space reclamation, used by retention at the end of a
    /// run (spec §4.G).
    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute_batch("VACUUM;").map_err(map_sqlite_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db"), &PragmaConfig::default()).unwrap();
        let v = store.verify_schema().unwrap();
        assert!(v.ok, "{:?}", v.messages);
    }

    #[test]
    fn integrity_check_ok_on_fresh_db() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db"), &PragmaConfig::default()).unwrap();
        let report = store.integrity_check(IntegrityDepth::Quick).unwrap();
        assert!(report.ok);
    }

    #[test]
    fn backup_produces_verified_copy() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db"), &PragmaConfig::default()).unwrap();
        let target = dir.path().join("backup.db");
        store.backup(&target).unwrap();
        assert!(target.exists());
    }

    #[test]
    fn pragmas_match_required_configuration() {
        let dir = tempdir().unwrap();
        let cfg = PragmaConfig::default();
        let store = Store::open(dir.path().join("t.db"), &cfg).unwrap();
        let report = store.pragma_report(&cfg).unwrap();
        assert!(report.iter().all(|o| o.matches), "{:?}", report);
    }
}
