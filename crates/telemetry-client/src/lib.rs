//! Client library for automation agents submitting runs to a local
//! telemetry ingestion service (spec §4.F).
//!
//! An agent constructs one [`Client`], calls [`Client::start_run`] (or
//! the panic-safe [`Client::track_run`]) around its work, and finalizes
//! with [`Client::end_run`]. If the ingest server is unreachable the run
//! is appended to an on-disk NDJSON buffer instead of being lost;
//! [`Client::replay`] resubmits buffered runs once the server is back.

mod buffer;
mod client;
mod config;
mod git;
mod handle;
mod http;

pub use buffer::{FileReplayOutcome, ReplayReport};
pub use client::{Client, SubmitOutcome};
pub use config::Config;
pub use git::{detect as detect_git_context, refresh as refresh_git_context, GitContext};
pub use handle::{MetricsUpdate, RunHandle};
pub use http::HttpOutcome;

pub use telemetry_core::{Error, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_config(buffer_dir: std::path::PathBuf) -> Config {
        Config {
            api_base_url: "http://127.0.0.1:1".to_string(),
            buffer_dir,
            api_enabled: true,
            max_retries: 0,
            ..Config::default()
        }
    }

    #[test]
    fn unreachable_server_buffers_the_run() {
        let dir = tempdir().unwrap();
        let client = Client::new(test_config(dir.path().to_path_buf())).unwrap();
        let handle = client.start_run("agent-a", "scrape", "manual", None);
        let outcome = client.end_run(handle, "success");
        assert_eq!(outcome, SubmitOutcome::Buffered);
    }

    #[test]
    fn duplicate_run_id_gets_a_distinct_suffix() {
        let dir = tempdir().unwrap();
        let client = Client::new(test_config(dir.path().to_path_buf())).unwrap();
        let first = client.start_run("agent-a", "scrape", "manual", Some("shared-id".into()));
        let second = client.start_run("agent-a", "scrape", "manual", Some("shared-id".into()));
        assert_ne!(first.run_id, second.run_id);
        assert!(second.run_id.starts_with("shared-id-duplicate-"));
        client.end_run(first, "success");
        client.end_run(second, "success");
    }

    #[test]
    fn track_run_finalizes_as_failure_on_err() {
        let dir = tempdir().unwrap();
        let client = Client::new(test_config(dir.path().to_path_buf())).unwrap();
        let result: std::result::Result<(), String> =
            client.track_run("agent-a", "scrape", "manual", |_handle| Err("boom".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn track_run_re_panics_after_finalizing() {
        let dir = tempdir().unwrap();
        let client = Client::new(test_config(dir.path().to_path_buf())).unwrap();
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: std::result::Result<(), String> =
                client.track_run("agent-a", "scrape", "manual", |_handle: &RunHandle| -> std::result::Result<(), String> {
                    panic!("kaboom");
                });
        }));
        assert!(caught.is_err());
    }
}
