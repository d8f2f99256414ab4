//! `telemetry-cli` — operator entry point: `serve`, `backup`, `retain`,
//! `integrity-check`, `migrate`, `health` (spec §4.G).

mod commands;

use std::path::PathBuf;
use std::process;

use clap::ArgMatches;

use telemetry_core::CURRENT_SCHEMA_VERSION;
use telemetry_maintenance::{
    check_integrity_with_guidance, health_report, run_backup, run_retention, BackupConfig,
    RetentionConfig,
};
use telemetry_storage::{PragmaConfig, Store};

use commands::build_cli;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let matches = build_cli().get_matches();
    let db_path = path_arg(&matches, "db", "telemetry.db");
    let lock_path = path_arg(&matches, "lock", "telemetry.lock");
    let pragma = PragmaConfig::default();

    let exit_code = match matches.subcommand() {
        Some(("serve", sub)) => run_serve(sub, db_path, lock_path, pragma),
        Some(("backup", sub)) => run_backup_cmd(sub, db_path, lock_path, pragma),
        Some(("retain", sub)) => run_retain_cmd(sub, db_path, lock_path, pragma),
        Some(("integrity-check", sub)) => run_integrity_cmd(sub, db_path, pragma),
        Some(("migrate", sub)) => run_migrate_cmd(sub, db_path, pragma),
        Some(("health", _)) => run_health_cmd(db_path, lock_path, pragma),
        _ => unreachable!("clap enforces subcommand_required"),
    };
    process::exit(exit_code);
}

fn path_arg(matches: &ArgMatches, name: &str, default: &str) -> PathBuf {
    matches
        .get_one::<String>(name)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn run_serve(sub: &ArgMatches, db_path: PathBuf, lock_path: PathBuf, pragma: PragmaConfig) -> i32 {
    let mut cfg = telemetry_server::ServerConfig {
        db_path,
        lock_path,
        pragma,
        ..telemetry_server::ServerConfig::default()
    };
    if let Some(bind) = sub.get_one::<String>("bind") {
        cfg.bind_addr = bind.clone();
    }
    if sub.get_flag("no-auto-migrate") {
        cfg.auto_migrate = false;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return 1;
        }
    };
    match runtime.block_on(telemetry_server::run(cfg)) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("server exited with error: {e}");
            1
        }
    }
}

fn run_backup_cmd(sub: &ArgMatches, db_path: PathBuf, lock_path: PathBuf, pragma: PragmaConfig) -> i32 {
    let mut cfg = BackupConfig::default();
    if let Some(dir) = sub.get_one::<String>("backup-dir") {
        cfg.backup_dir = PathBuf::from(dir);
    }
    if let Some(keep) = sub.get_one::<String>("keep").and_then(|v| v.parse().ok()) {
        cfg.keep_n = keep;
    }

    match run_backup(&db_path, &lock_path, &pragma, &cfg) {
        Ok(target) => {
            println!("backup written to {}", target.display());
            0
        }
        Err(e) => {
            eprintln!("backup failed: {e}");
            1
        }
    }
}

fn run_retain_cmd(sub: &ArgMatches, db_path: PathBuf, lock_path: PathBuf, pragma: PragmaConfig) -> i32 {
    let mut cfg = RetentionConfig::default();
    if let Some(days) = sub.get_one::<String>("days").and_then(|v| v.parse().ok()) {
        cfg.retain_days = days;
    }
    if let Some(batch) = sub.get_one::<String>("batch-size").and_then(|v| v.parse().ok()) {
        cfg.batch_size = batch;
    }
    cfg.dry_run = sub.get_flag("dry-run");

    match run_retention(&db_path, &lock_path, &pragma, &cfg) {
        Ok(report) => {
            println!(
                "eligible={} deleted={} batches={} dry_run={}",
                report.eligible_rows, report.rows_deleted, report.batches_run, report.dry_run
            );
            if let Some(eta) = report.estimated_total {
                println!("estimated total time at observed rate: {:.1}s", eta.as_secs_f64());
            }
            0
        }
        Err(e) => {
            eprintln!("retention run failed: {e}");
            1
        }
    }
}

fn run_integrity_cmd(sub: &ArgMatches, db_path: PathBuf, pragma: PragmaConfig) -> i32 {
    let backup_dir = sub
        .get_one::<String>("backup-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./backups"));

    match check_integrity_with_guidance(&db_path, &pragma, &backup_dir) {
        Ok(outcome) if outcome.report.ok => {
            println!("integrity check ok");
            0
        }
        Ok(outcome) => {
            eprintln!("integrity check failed: {}", outcome.report.message);
            match outcome.recovery_candidate {
                Some(candidate) => eprintln!("newest healthy backup candidate: {}", candidate.display()),
                None => eprintln!("no backup found in {}", backup_dir.display()),
            }
            1
        }
        Err(e) => {
            eprintln!("integrity check could not run: {e}");
            1
        }
    }
}

fn run_migrate_cmd(sub: &ArgMatches, db_path: PathBuf, pragma: PragmaConfig) -> i32 {
    let to_version = sub
        .get_one::<String>("to-version")
        .and_then(|v| v.parse().ok())
        .unwrap_or(CURRENT_SCHEMA_VERSION);

    let store = match Store::open(&db_path, &pragma) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to open store: {e}");
            return 1;
        }
    };
    match store.migrate(to_version) {
        Ok(()) => {
            println!("migrated to schema version {to_version}");
            0
        }
        Err(e) => {
            eprintln!("migration failed: {e}");
            1
        }
    }
}

fn run_health_cmd(db_path: PathBuf, lock_path: PathBuf, pragma: PragmaConfig) -> i32 {
    match health_report(&db_path, &lock_path, &pragma) {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("failed to serialize health report: {e}"),
            }
            0
        }
        Err(e) => {
            eprintln!("health check failed: {e}");
            1
        }
    }
}
