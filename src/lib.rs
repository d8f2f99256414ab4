//! # telemetry-hub
//!
//! Local telemetry ingestion for a fleet of cooperating automation
//! agents: an HTTP ingest server backed by an embedded SQLite store, and
//! a client library agents embed directly in their own process.
//!
//! # Quick Start
//!
//! ```no_run
//! use telemetry_hub::{Client, Config};
//!
//! fn main() -> telemetry_hub::Result<()> {
//!     let client = Client::new(Config::from_env())?;
//!     let handle = client.start_run("price-watcher", "scrape", "scheduled", None);
//!     handle.set_metrics(telemetry_hub::MetricsUpdate {
//!         items_discovered: Some(42),
//!         ..Default::default()
//!     });
//!     client.end_run(handle, "success");
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! Agents talk to the client crate ([`Client`]); the client submits over
//! HTTP to a `telemetry-server` process, falling back to an on-disk
//! NDJSON buffer when the server is unreachable. Dashboards and
//! maintenance scripts read the store directly through
//! [`QueryEngine`]/[`RunFilter`] against a read-only connection, or shell
//! out to the `telemetry-cli` binary.
//!
//! [`Store`] is re-exported because [`QueryEngine::new`] takes one
//! directly; `telemetry-concurrency`'s writer-serialization types are not,
//! since only the server process ever holds the write lock.

pub use telemetry_client::{
    detect_git_context, refresh_git_context, Client, Config, GitContext, HttpOutcome,
    MetricsUpdate, ReplayReport, RunHandle, SubmitOutcome,
};
pub use telemetry_core::{Error, Result, Run, RunEvent, RunStatus};
pub use telemetry_engine::{AggregateGroup, Cursor, Grouping, ListRunsResult, Page, QueryEngine, RunFilter};
pub use telemetry_storage::Store;
