//! `monitor_telemetry_health` equivalent (SPEC_FULL.md SUPPLEMENTED
//! FEATURES): a combined snapshot of integrity, size, row counts, and
//! writer-lock holder, surfaced at `GET /metrics` and `telemetry-cli
//! health`.

use std::fs;
use std::path::Path;

use serde::Serialize;

use telemetry_core::Result;
use telemetry_storage::{IntegrityDepth, PragmaConfig, Store};

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_message: String,
    pub db_size_bytes: u64,
    pub total_runs: i64,
    pub lock_holder: Option<LockHolderInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LockHolderInfo {
    pub pid: String,
    pub host: String,
}

pub fn health_report(
    db_path: impl AsRef<Path>,
    lock_path: impl AsRef<Path>,
    pragma: &PragmaConfig,
) -> Result<HealthReport> {
    let store = Store::open_reader(db_path.as_ref(), pragma)?;
    let integrity = store.integrity_check(IntegrityDepth::Quick)?;
    let total_runs: i64 = store
        .connection()
        .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))
        .map_err(|e| telemetry_core::Error::Store(e.to_string()))?;
    let db_size_bytes = fs::metadata(db_path.as_ref()).map(|m| m.len()).unwrap_or(0);

    Ok(HealthReport {
        integrity_ok: integrity.ok,
        integrity_message: integrity.message,
        db_size_bytes,
        total_runs,
        lock_holder: read_lock_holder(lock_path.as_ref()),
    })
}

/// Parses the documented lock-file format (spec §6: "Text file... `pid\n
/// host\n`") without requiring exclusive access to it.
fn read_lock_holder(lock_path: &Path) -> Option<LockHolderInfo> {
    let contents = fs::read_to_string(lock_path).ok()?;
    let mut lines = contents.lines();
    let pid = lines.next()?.to_string();
    let host = lines.next()?.to_string();
    Some(LockHolderInfo { pid, host })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reports_zero_runs_on_fresh_db() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("telemetry.db");
        let lock_path = dir.path().join("writer.lock");
        let pragma = PragmaConfig::default();
        Store::open(&db_path, &pragma).unwrap();

        let report = health_report(&db_path, &lock_path, &pragma).unwrap();
        assert!(report.integrity_ok);
        assert_eq!(report.total_runs, 0);
        assert!(report.lock_holder.is_none());
    }
}
