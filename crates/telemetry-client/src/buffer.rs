//! Append-only NDJSON failover buffer (spec §4.F, §6 "Persisted NDJSON
//! buffer format"): one JSON object per line, fsynced per append, files
//! named `events_YYYYMMDD.ndjson`, replayed oldest-first with
//! halt-on-error-per-file to preserve order.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use telemetry_core::{Result, Run, RunEvent};

use crate::http::HttpOutcome;

/// Appends canonicalized `Run` records to the dated buffer file (spec §6:
/// "Each object contains a full canonicalized Run payload as it would be
/// POSTed").
pub struct RunBuffer {
    dir: PathBuf,
}

impl RunBuffer {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(RunBuffer { dir })
    }

    pub fn append(&self, run: &Run) -> Result<()> {
        let path = self.dir.join(file_name_for_today());
        let line = serde_json::to_string(run)?;
        append_line_fsynced(&path, &line)
    }

    /// Buffer files, oldest-first by filename (which embeds the date).
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("events_") && n.ends_with(".ndjson"))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Scans buffer files oldest-first and re-submits each record via
    /// `submit_fn`. A file is deleted once every record in it came back
    /// `created` or `duplicate`; the first record that errors halts
    /// replay of that file (and of all later files, to preserve order)
    /// and the file is rewritten with only the unreplayed remainder
    /// (spec §8 "replay idempotence").
    pub fn replay(
        &self,
        mut submit_fn: impl FnMut(&Run) -> HttpOutcome<ReplaySubmitBody>,
    ) -> Result<ReplayReport> {
        let mut report = ReplayReport::default();
        for path in self.files()? {
            let outcome = self.replay_file(&path, &mut submit_fn)?;
            report.files_processed += 1;
            report.replayed += outcome.replayed;
            report.errors += outcome.errors;
            if outcome.halted {
                report.halted = true;
                break;
            }
        }
        Ok(report)
    }

    fn replay_file(
        &self,
        path: &Path,
        submit_fn: &mut impl FnMut(&Run) -> HttpOutcome<ReplaySubmitBody>,
    ) -> Result<FileReplayOutcome> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut remainder: Vec<String> = Vec::new();
        let mut outcome = FileReplayOutcome::default();
        let mut halted = false;

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if halted {
                remainder.push(line);
                continue;
            }
            let run: Run = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping unparseable buffered record");
                    continue;
                }
            };
            match submit_fn(&run) {
                HttpOutcome::Ok(_) => outcome.replayed += 1,
                HttpOutcome::Rejected { .. } | HttpOutcome::Unreachable(_) => {
                    outcome.errors += 1;
                    halted = true;
                    remainder.push(line);
                }
            }
        }

        outcome.halted = halted;
        if remainder.is_empty() {
            fs::remove_file(path)?;
        } else {
            fs::write(path, remainder.join("\n") + "\n")?;
        }
        Ok(outcome)
    }
}

/// Marker type: `replay`'s submit closure only needs to report success or
/// failure, not parse a response body, so it is generic over a unit-like
/// response type.
pub type ReplaySubmitBody = serde_json::Value;

#[derive(Debug, Default)]
pub struct FileReplayOutcome {
    pub replayed: usize,
    pub errors: usize,
    pub halted: bool,
}

/// Aggregate result of [`RunBuffer::replay`] (spec §4.F `replay`).
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub files_processed: usize,
    pub replayed: usize,
    pub errors: usize,
    pub halted: bool,
}

/// Supplemental buffer for `RunEvent`s (spec §4.F `log_event`: "appends a
/// RunEvent to the NDJSON buffer (not sent by default)"). These have no
/// server endpoint in v1 and are never replayed; they exist for local
/// diagnostics and a future ingestion path.
pub struct EventBuffer {
    dir: PathBuf,
}

impl EventBuffer {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(EventBuffer { dir })
    }

    pub fn append(&self, event: &RunEvent) -> Result<()> {
        let path = self
            .dir
            .join(format!("run_events_{}.ndjson", Utc::now().format("%Y%m%d")));
        let line = serde_json::to_string(event)?;
        append_line_fsynced(&path, &line)
    }
}

fn file_name_for_today() -> String {
    format!("events_{}.ndjson", Utc::now().format("%Y%m%d"))
}

fn append_line_fsynced(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    file.sync_all()?;
    Ok(())
}
