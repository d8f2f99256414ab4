//! Operator-driven maintenance operations (spec §4.G): backup/rotate,
//! batched retention, on-demand integrity checks, and restore. These run
//! under operator control against a stopped (or at least
//! writer-lock-free) server, never from inside `telemetry-server` itself.

mod backup;
mod health;
mod integrity;
mod restore;
mod retention;

pub use backup::{newest_backup, run_backup, BackupConfig};
pub use health::{health_report, HealthReport, LockHolderInfo};
pub use integrity::{check_integrity, check_integrity_with_guidance, IntegrityOutcome};
pub use restore::restore_from_backup;
pub use retention::{run_retention, RetentionConfig, RetentionReport, DEFAULT_RETENTION_BATCH_SIZE};
