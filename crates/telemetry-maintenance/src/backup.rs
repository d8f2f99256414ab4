//! Online backup + rotation (spec §4.G "Backup": "stop service ->
//! online-copy store file to timestamped target -> verify integrity ->
//! rotate (keep N most recent) -> restart service"). The "stop/restart"
//! half of that sequence is the operator's job — this operation enforces
//! it mechanically by requiring exclusive possession of the writer lock
//! for the duration of the copy.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use telemetry_concurrency::WriterGuard;
use telemetry_core::Result;
use telemetry_storage::{PragmaConfig, Store};

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub backup_dir: PathBuf,
    /// Number of most-recent backups to keep; older ones are deleted
    /// after a successful run (spec §4.G "rotate").
    pub keep_n: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        BackupConfig {
            backup_dir: PathBuf::from("./backups"),
            keep_n: 7,
        }
    }
}

/// Runs one backup cycle. Fails immediately (without performing any
/// copy) if `lock_path` is already held — that means `telemetry-server`
/// is running and the store file is not safe to snapshot by policy
/// (spec §5 "Backups and retention acquire the lock exclusively (service
/// down)").
pub fn run_backup(
    db_path: impl AsRef<Path>,
    lock_path: impl AsRef<Path>,
    pragma: &PragmaConfig,
    cfg: &BackupConfig,
) -> Result<PathBuf> {
    let guard = WriterGuard::acquire(lock_path)?;
    let result = run_backup_locked(db_path.as_ref(), pragma, cfg);
    drop(guard);
    result
}

fn run_backup_locked(db_path: &Path, pragma: &PragmaConfig, cfg: &BackupConfig) -> Result<PathBuf> {
    fs::create_dir_all(&cfg.backup_dir)?;
    let store = Store::open_reader(db_path, pragma)?;

    let timestamp = store
        .connection()
        .query_row("SELECT strftime('%Y%m%dT%H%M%SZ', 'now')", [], |row| {
            row.get::<_, String>(0)
        })
        .map_err(|e| telemetry_core::Error::Store(e.to_string()))?;
    let target = cfg.backup_dir.join(format!("telemetry-backup-{timestamp}.db"));

    store.backup(&target)?;
    info!(target = %target.display(), "backup completed and verified");

    rotate(&cfg.backup_dir, cfg.keep_n)?;
    Ok(target)
}

/// Deletes all but the `keep_n` most recent `telemetry-backup-*.db` files
/// in `dir`, newest-first by filename (the embedded timestamp sorts
/// lexicographically).
fn rotate(dir: &Path, keep_n: usize) -> Result<()> {
    let mut backups: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("telemetry-backup-") && n.ends_with(".db"))
        })
        .collect();
    backups.sort();
    backups.reverse();

    for stale in backups.into_iter().skip(keep_n) {
        info!(path = %stale.display(), "rotating out old backup");
        fs::remove_file(&stale)?;
    }
    Ok(())
}

/// The newest backup in `dir`, if any (spec §4.G "on failure, guide
/// operator to the newest healthy backup").
pub fn newest_backup(dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut backups: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("telemetry-backup-") && n.ends_with(".db"))
        })
        .collect();
    backups.sort();
    backups.pop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn backup_creates_and_rotates() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("telemetry.db");
        let lock_path = dir.path().join("writer.lock");
        let backup_dir = dir.path().join("backups");
        let pragma = PragmaConfig::default();

        // touch the db file into existence via a write-mode open.
        Store::open(&db_path, &pragma).unwrap();

        let cfg = BackupConfig {
            backup_dir: backup_dir.clone(),
            keep_n: 1,
        };
        let first = run_backup(&db_path, &lock_path, &pragma, &cfg).unwrap();
        assert!(first.exists());
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let second = run_backup(&db_path, &lock_path, &pragma, &cfg).unwrap();
        assert!(second.exists());

        let remaining: Vec<_> = fs::read_dir(&backup_dir).unwrap().collect();
        assert_eq!(remaining.len(), 1, "rotation should keep only keep_n backups");
        assert_eq!(newest_backup(&backup_dir).unwrap(), second);
    }

    #[test]
    fn backup_fails_while_lock_held() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("telemetry.db");
        let lock_path = dir.path().join("writer.lock");
        let pragma = PragmaConfig::default();
        Store::open(&db_path, &pragma).unwrap();

        let _holder = WriterGuard::acquire(&lock_path).unwrap();
        let cfg = BackupConfig {
            backup_dir: dir.path().join("backups"),
            keep_n: 3,
        };
        assert!(run_backup(&db_path, &lock_path, &pragma, &cfg).is_err());
    }
}
