//! Required connection pragmas (spec §4.A) and their verification.
//!
//! Every connection opened for *writing* must carry this exact pragma set.
//! Reader connections only need `busy_timeout`; they never set
//! `synchronous`/`journal_mode` since those are database-wide, not
//! per-connection, in SQLite — but verifying them on open lets a reader
//! detect a misconfigured database file early.

use rusqlite::Connection;
use tracing::warn;

use telemetry_core::{Error, Result};

/// Journal mode choice (spec's Open Question 3: DELETE is the default and
/// only mode exercised by tests; WAL is an opt-in deployment choice).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    Delete,
    Wal,
}

impl JournalMode {
    fn as_pragma_value(self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Wal => "WAL",
        }
    }
}

/// Synchronous level; spec requires FULL on every writer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynchronousLevel {
    Full,
    Normal,
}

impl SynchronousLevel {
    fn as_pragma_value(self) -> &'static str {
        match self {
            SynchronousLevel::Full => "FULL",
            SynchronousLevel::Normal => "NORMAL",
        }
    }
}

/// The pragma set applied to every writer connection (spec §4.A).
#[derive(Debug, Clone, Copy)]
pub struct PragmaConfig {
    pub busy_timeout_ms: u32,
    pub synchronous: SynchronousLevel,
    pub journal_mode: JournalMode,
    /// Only meaningful when `journal_mode == Wal`.
    pub wal_autocheckpoint: u32,
}

impl Default for PragmaConfig {
    fn default() -> Self {
        PragmaConfig {
            busy_timeout_ms: 30_000,
            synchronous: SynchronousLevel::Full,
            journal_mode: JournalMode::Delete,
            wal_autocheckpoint: 100,
        }
    }
}

/// A single observed pragma value, used for [`pragma_report`].
#[derive(Debug, Clone)]
pub struct PragmaObservation {
    pub name: &'static str,
    pub expected: String,
    pub actual: String,
    pub matches: bool,
}

/// Apply the required pragma set to a writer connection, then read each
/// value back and log/warn on any divergence (spec §4.A: "The connector
/// *verifies* post-setting pragma values").
pub fn apply_and_verify(conn: &Connection, cfg: &PragmaConfig) -> Result<Vec<PragmaObservation>> {
    conn.busy_timeout(std::time::Duration::from_millis(cfg.busy_timeout_ms as u64))
        .map_err(map_sqlite_err)?;
    conn.pragma_update(None, "synchronous", cfg.synchronous.as_pragma_value())
        .map_err(map_sqlite_err)?;
    conn.pragma_update(None, "journal_mode", cfg.journal_mode.as_pragma_value())
        .map_err(map_sqlite_err)?;
    if cfg.journal_mode == JournalMode::Wal {
        conn.pragma_update(None, "wal_autocheckpoint", cfg.wal_autocheckpoint)
            .map_err(map_sqlite_err)?;
    }

    let observations = pragma_report(conn, cfg)?;
    for obs in &observations {
        if !obs.matches {
            warn!(
                pragma = obs.name,
                expected = %obs.expected,
                actual = %obs.actual,
                "pragma diverged from required configuration"
            );
        }
    }
    Ok(observations)
}

/// Read back the live pragma values next to the required ones (spec's
/// supplemented `diagnose_pragma_settings` equivalent, SPEC_FULL.md).
pub fn pragma_report(conn: &Connection, cfg: &PragmaConfig) -> Result<Vec<PragmaObservation>> {
    let synchronous: i64 = conn
        .pragma_query_value(None, "synchronous", |row| row.get(0))
        .map_err(map_sqlite_err)?;
    let journal_mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(map_sqlite_err)?;

    let expected_sync_code = match cfg.synchronous {
        SynchronousLevel::Full => 2,
        SynchronousLevel::Normal => 1,
    };
    let expected_journal = cfg.journal_mode.as_pragma_value().to_ascii_lowercase();

    Ok(vec![
        PragmaObservation {
            name: "synchronous",
            expected: expected_sync_code.to_string(),
            actual: synchronous.to_string(),
            matches: synchronous == expected_sync_code,
        },
        PragmaObservation {
            name: "journal_mode",
            expected: expected_journal.clone(),
            actual: journal_mode.clone(),
            matches: journal_mode.eq_ignore_ascii_case(&expected_journal),
        },
    ])
}

pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::DatabaseBusy
                || inner.code == rusqlite::ErrorCode::DatabaseLocked =>
        {
            Error::Busy
        }
        _ => Error::Store(e.to_string()),
    }
}
