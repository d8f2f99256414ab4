//! `Client`: the agent-facing entry point (spec §4.F). Wires together
//! configuration, git enrichment, the HTTP client, and the NDJSON
//! failover buffers into `start_run` / `end_run` / `track_run` /
//! `replay`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use telemetry_core::{canonicalize_insert, Error, Result, Run};

use crate::buffer::{EventBuffer, ReplayReport, RunBuffer};
use crate::config::Config;
use crate::git;
use crate::handle::RunHandle;
use crate::http::{HttpClient, HttpOutcome};

/// Outcome of [`Client::end_run`] (spec §4.F: "on success, submit
/// immediately... on failure, fall back to the local buffer").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The server accepted the run as newly created.
    Created,
    /// The server recognized `event_id` as an existing row (idempotent
    /// resubmit).
    Duplicate,
    /// The network call did not succeed; the run was appended to the
    /// local failover buffer for later `replay`.
    Buffered,
    /// The server deliberately rejected the run (e.g. validation); in
    /// non-strict mode this is logged and swallowed, never buffered
    /// (resubmitting an invalid payload can never succeed).
    Rejected { status: u16, detail: String },
}

pub(crate) struct Inner {
    pub(crate) config: Config,
    pub(crate) http: HttpClient,
    pub(crate) run_buffer: RunBuffer,
    pub(crate) event_buffer: EventBuffer,
    pub(crate) active_run_ids: DashMap<String, ()>,
}

/// Agent-facing client (spec §4.F `Client`). Cheap to clone; all state
/// lives behind an `Arc`.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    pub fn new(config: Config) -> Result<Self> {
        let run_buffer = RunBuffer::new(config.buffer_dir.join("runs"))?;
        let event_buffer = EventBuffer::new(config.buffer_dir.join("events"))?;
        let http = HttpClient::new(&config);
        Ok(Client {
            inner: Arc::new(Inner {
                config,
                http,
                run_buffer,
                event_buffer,
                active_run_ids: DashMap::new(),
            }),
        })
    }

    pub fn from_env() -> Result<Self> {
        Client::new(Config::from_env())
    }

    /// Begins tracking a run (spec §4.F `start_run`). `run_id` may be
    /// supplied by the caller (e.g. a scheduler's job id); a collision
    /// with an already-active `run_id` on this client is resolved by
    /// suffixing a short disambiguator rather than rejecting the call,
    /// since the field is not a uniqueness key in storage (`event_id`
    /// is).
    pub fn start_run(
        &self,
        agent_name: impl Into<String>,
        job_type: impl Into<String>,
        trigger_type: impl Into<String>,
        run_id: Option<String>,
    ) -> RunHandle {
        let event_id = Uuid::new_v4().to_string();
        let requested = run_id.unwrap_or_else(|| event_id.clone());
        let run_id = self.reserve_run_id(requested);
        let ctx = git::detect();

        RunHandle {
            inner: Arc::clone(&self.inner),
            event_id,
            run_id,
            agent_name: agent_name.into(),
            job_type: job_type.into(),
            trigger_type: trigger_type.into(),
            start_time: Utc::now(),
            git_repo: ctx.git_repo,
            git_branch: ctx.git_branch,
            git_run_tag: ctx.git_run_tag,
            fields: Default::default(),
        }
    }

    fn reserve_run_id(&self, requested: String) -> String {
        if self.inner.active_run_ids.insert(requested.clone(), ()).is_none() {
            return requested;
        }
        let mut candidate = requested.clone();
        let mut suffix = 0u32;
        loop {
            suffix += 1;
            candidate = format!("{requested}-duplicate-{:04x}", Uuid::new_v4().as_fields().0 ^ suffix);
            if self.inner.active_run_ids.insert(candidate.clone(), ()).is_none() {
                return candidate;
            }
        }
    }

    /// Finalizes a run (spec §4.F `end_run`): canonicalizes, attempts
    /// immediate submission, and falls back to the local buffer on
    /// network failure.
    pub fn end_run(&self, handle: RunHandle, status: &str) -> SubmitOutcome {
        self.end_run_at(handle, status, None)
    }

    pub fn end_run_at(
        &self,
        handle: RunHandle,
        status: &str,
        end_time: Option<DateTime<Utc>>,
    ) -> SubmitOutcome {
        let run_id = handle.run_id.clone();
        self.inner.active_run_ids.remove(&run_id);

        let input = handle.into_run_input(status, end_time);
        let run = match canonicalize_insert(input) {
            Ok(run) => run,
            Err(e) => {
                self.handle_internal_failure(&e, "canonicalize run before submit");
                return SubmitOutcome::Rejected {
                    status: 400,
                    detail: e.to_string(),
                };
            }
        };

        self.submit(&run)
    }

    fn submit(&self, run: &Run) -> SubmitOutcome {
        if !self.inner.config.api_enabled {
            return self.buffer_or_fail(run);
        }

        match self.inner.http.post_json::<Run, serde_json::Value>("/api/v1/runs", run) {
            HttpOutcome::Ok(body) => {
                if body.get("status").and_then(|v| v.as_str()) == Some("duplicate") {
                    SubmitOutcome::Duplicate
                } else {
                    SubmitOutcome::Created
                }
            }
            HttpOutcome::Rejected { status, body } => {
                tracing::warn!(status, body, run_id = %run.run_id, "server rejected run submission");
                SubmitOutcome::Rejected { status, detail: body }
            }
            HttpOutcome::Unreachable(reason) => {
                tracing::warn!(reason, run_id = %run.run_id, "ingest server unreachable, buffering run");
                self.buffer_or_fail(run)
            }
        }
    }

    fn buffer_or_fail(&self, run: &Run) -> SubmitOutcome {
        match self.inner.run_buffer.append(run) {
            Ok(()) => SubmitOutcome::Buffered,
            Err(e) => {
                self.handle_internal_failure(&e, "append run to failover buffer");
                SubmitOutcome::Rejected {
                    status: 0,
                    detail: e.to_string(),
                }
            }
        }
    }

    fn handle_internal_failure(&self, err: &Error, context: &str) {
        if self.inner.config.strict_mode {
            panic!("telemetry client internal failure ({context}): {err}");
        }
        tracing::error!(error = %err, context, "telemetry client swallowed internal failure");
    }

    /// Runs `f` under a tracked run, guaranteeing `end_run` is called on
    /// every exit path — normal return, `Err`, or panic (spec §4.F
    /// "scope-exit... the terminal status is failure on any exceptional
    /// exit, and error_summary captures the exception's short name and
    /// message").
    pub fn track_run<F, T, E>(
        &self,
        agent_name: impl Into<String>,
        job_type: impl Into<String>,
        trigger_type: impl Into<String>,
        f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&RunHandle) -> std::result::Result<T, E>,
        E: std::fmt::Display,
    {
        let handle = self.start_run(agent_name, job_type, trigger_type, None);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&handle)));

        match result {
            Ok(Ok(value)) => {
                self.end_run(handle, "success");
                Ok(value)
            }
            Ok(Err(err)) => {
                let message = err.to_string();
                handle.set_metrics(crate::handle::MetricsUpdate {
                    error_summary: Some(message),
                    ..Default::default()
                });
                self.end_run(handle, "failure");
                Err(err)
            }
            Err(payload) => {
                let message = panic_message(&payload);
                handle.set_metrics(crate::handle::MetricsUpdate {
                    error_summary: Some(message),
                    ..Default::default()
                });
                self.end_run(handle, "failure");
                std::panic::resume_unwind(payload);
            }
        }
    }

    /// Replays every buffered run against the ingest server (spec §4.F
    /// `replay`), in file order, halting a file at the first failure to
    /// preserve ordering.
    pub fn replay(&self) -> Result<ReplayReport> {
        let http = &self.inner.http;
        self.inner.run_buffer.replay(|run| {
            http.post_json::<Run, serde_json::Value>("/api/v1/runs", run)
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
