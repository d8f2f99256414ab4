//! Clap command tree definition (spec §4.G operator surface): `serve`,
//! `backup`, `retain`, `integrity-check`, `migrate`, `health`.

use clap::{Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("telemetry-cli")
        .about("Operator CLI for the telemetry ingestion service")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("db")
                .long("db")
                .help("Store file path (default: telemetry.db)")
                .global(true),
        )
        .arg(
            Arg::new("lock")
                .long("lock")
                .help("Writer lock file path (default: telemetry.lock)")
                .global(true),
        )
        .subcommand(build_serve())
        .subcommand(build_backup())
        .subcommand(build_retain())
        .subcommand(build_integrity_check())
        .subcommand(build_migrate())
        .subcommand(build_health())
}

fn build_serve() -> Command {
    Command::new("serve")
        .about("Run the ingest server in the foreground")
        .arg(
            Arg::new("bind")
                .long("bind")
                .help("Address to bind (default: 127.0.0.1:4317)"),
        )
        .arg(
            Arg::new("no-auto-migrate")
                .long("no-auto-migrate")
                .help("Fail startup instead of auto-migrating the schema")
                .action(ArgAction::SetTrue),
        )
}

fn build_backup() -> Command {
    Command::new("backup")
        .about("Online-copy the store to a timestamped backup file, then rotate")
        .arg(
            Arg::new("backup-dir")
                .long("backup-dir")
                .help("Directory backups are written to (default: ./backups)"),
        )
        .arg(
            Arg::new("keep")
                .long("keep")
                .help("Number of most-recent backups to retain (default: 7)"),
        )
}

fn build_retain() -> Command {
    Command::new("retain")
        .about("Delete rows older than a configured age, in bounded batches")
        .arg(
            Arg::new("days")
                .long("days")
                .help("Delete rows with created_at older than this many days (default: 90)"),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .help("Rows deleted per committed batch (default: 100000)"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Report counts without deleting")
                .action(ArgAction::SetTrue),
        )
}

fn build_integrity_check() -> Command {
    Command::new("integrity-check")
        .about("Run a full integrity check and suggest a recovery backup on failure")
        .arg(
            Arg::new("backup-dir")
                .long("backup-dir")
                .help("Directory to search for a recovery candidate (default: ./backups)"),
        )
}

fn build_migrate() -> Command {
    Command::new("migrate")
        .about("Apply pending schema migrations up to a target version")
        .arg(
            Arg::new("to-version")
                .long("to-version")
                .help("Target schema version (default: current)"),
        )
}

fn build_health() -> Command {
    Command::new("health").about("Print a combined health snapshot as JSON")
}
