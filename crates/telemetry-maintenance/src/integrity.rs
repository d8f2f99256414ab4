//! On-demand integrity checking (spec §4.G "Integrity": "run
//! `integrity_check(full)` on demand; on failure, guide operator to the
//! newest healthy backup").

use std::path::Path;

use telemetry_core::Result;
use telemetry_storage::{IntegrityDepth, IntegrityReport, PragmaConfig, Store};

use crate::backup::newest_backup;

/// Runs a full integrity check against a read-only connection — this
/// does not require the writer lock, since SQLite's `integrity_check`
/// pragma is a read-only operation and the server may stay up while an
/// operator runs diagnostics.
pub fn check_integrity(db_path: impl AsRef<Path>, pragma: &PragmaConfig) -> Result<IntegrityReport> {
    let store = Store::open_reader(db_path, pragma)?;
    store.integrity_check(IntegrityDepth::Full)
}

/// A failed integrity check paired with the operator's next step, if a
/// backup is available to recover from.
#[derive(Debug, Clone)]
pub struct IntegrityOutcome {
    pub report: IntegrityReport,
    pub recovery_candidate: Option<std::path::PathBuf>,
}

pub fn check_integrity_with_guidance(
    db_path: impl AsRef<Path>,
    pragma: &PragmaConfig,
    backup_dir: impl AsRef<Path>,
) -> Result<IntegrityOutcome> {
    let report = check_integrity(db_path, pragma)?;
    let recovery_candidate = if report.ok {
        None
    } else {
        newest_backup(backup_dir)
    };
    Ok(IntegrityOutcome {
        report,
        recovery_candidate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fresh_db_is_healthy() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("telemetry.db");
        let pragma = PragmaConfig::default();
        Store::open(&db_path, &pragma).unwrap();
        let report = check_integrity(&db_path, &pragma).unwrap();
        assert!(report.ok);
    }
}
