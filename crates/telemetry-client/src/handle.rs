//! `RunHandle` (spec §4.F): local accumulation of a run's metrics and
//! events between `start_run` and `end_run`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use telemetry_core::{RunEvent, RunInput};

use crate::client::Inner;

/// Partial field update accepted by [`RunHandle::set_metrics`]. Every
/// field is additive: `None` leaves the previously recorded value
/// untouched (mirrors `RunPatch`'s no-op-on-omission rule, applied here
/// client-side before the record is ever canonicalized).
#[derive(Debug, Clone, Default)]
pub struct MetricsUpdate {
    pub items_discovered: Option<i64>,
    pub items_succeeded: Option<i64>,
    pub items_failed: Option<i64>,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub error_summary: Option<String>,
    pub error_details: Option<String>,
    pub metrics_json: Option<Value>,
    pub context_json: Option<Value>,
    pub product: Option<String>,
    pub platform: Option<String>,
    pub product_family: Option<String>,
    pub website: Option<String>,
    pub website_section: Option<String>,
    pub item_name: Option<String>,
    pub insight_id: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct HandleFields {
    pub items_discovered: i64,
    pub items_succeeded: i64,
    pub items_failed: i64,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub error_summary: Option<String>,
    pub error_details: Option<String>,
    pub metrics_json: Option<Value>,
    pub context_json: Option<Value>,
    pub product: Option<String>,
    pub platform: Option<String>,
    pub product_family: Option<String>,
    pub website: Option<String>,
    pub website_section: Option<String>,
    pub item_name: Option<String>,
    pub insight_id: Option<String>,
}

impl HandleFields {
    fn apply(&mut self, update: MetricsUpdate) {
        if let Some(v) = update.items_discovered {
            self.items_discovered = v;
        }
        if let Some(v) = update.items_succeeded {
            self.items_succeeded = v;
        }
        if let Some(v) = update.items_failed {
            self.items_failed = v;
        }
        macro_rules! set_opt {
            ($field:ident) => {
                if update.$field.is_some() {
                    self.$field = update.$field;
                }
            };
        }
        set_opt!(input_summary);
        set_opt!(output_summary);
        set_opt!(error_summary);
        set_opt!(error_details);
        set_opt!(product);
        set_opt!(platform);
        set_opt!(product_family);
        set_opt!(website);
        set_opt!(website_section);
        set_opt!(item_name);
        set_opt!(insight_id);
        if update.metrics_json.is_some() {
            self.metrics_json = update.metrics_json;
        }
        if update.context_json.is_some() {
            self.context_json = update.context_json;
        }
    }
}

/// A tracked, not-yet-finalized run (spec §4.F `start_run` return value).
pub struct RunHandle {
    pub(crate) inner: Arc<Inner>,
    pub event_id: String,
    pub run_id: String,
    pub(crate) agent_name: String,
    pub(crate) job_type: String,
    pub(crate) trigger_type: String,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) git_repo: Option<String>,
    pub(crate) git_branch: Option<String>,
    pub(crate) git_run_tag: Option<String>,
    pub(crate) fields: Mutex<HandleFields>,
}

impl RunHandle {
    /// Local buffering of partial fields (spec §4.F
    /// `RunHandle.set_metrics`); never touches the network.
    pub fn set_metrics(&self, update: MetricsUpdate) {
        self.fields.lock().apply(update);
    }

    /// Appends a `RunEvent` to the local NDJSON event log (spec §4.F
    /// `log_event`: "not sent by default"). Best-effort: a write failure
    /// is logged and swallowed, never raised, per the never-crash rule.
    pub fn log_event(&self, event_type: impl Into<String>, metadata: Option<Value>) {
        let event = RunEvent {
            run_id: self.run_id.clone(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            message: None,
            metadata_json: metadata.map(|v| v.to_string()),
        };
        if let Err(e) = self.inner.event_buffer.append(&event) {
            tracing::warn!(error = %e, run_id = %self.run_id, "failed to append run event to local buffer");
        }
    }

    /// Builds the `RunInput` `end_run` will canonicalize and submit.
    pub(crate) fn into_run_input(self, status: &str, end_time: Option<DateTime<Utc>>) -> RunInput {
        let fields = self.fields.into_inner();
        let end_time = end_time.or(Some(Utc::now()));
        let duration_ms = end_time
            .map(|end| end.signed_duration_since(self.start_time).num_milliseconds().max(0))
            .unwrap_or(0);
        RunInput {
            event_id: self.event_id,
            run_id: self.run_id,
            agent_name: self.agent_name,
            job_type: self.job_type,
            trigger_type: self.trigger_type,
            start_time: self.start_time,
            end_time,
            status: status.to_string(),
            duration_ms,
            items_discovered: fields.items_discovered,
            items_succeeded: fields.items_succeeded,
            items_failed: fields.items_failed,
            input_summary: fields.input_summary,
            output_summary: fields.output_summary,
            error_summary: fields.error_summary,
            error_details: fields.error_details,
            metrics_json: fields.metrics_json.map(|v| v.to_string()),
            context_json: fields.context_json.map(|v| v.to_string()),
            product: fields.product,
            platform: fields.platform,
            product_family: fields.product_family,
            website: fields.website,
            website_section: fields.website_section,
            item_name: fields.item_name,
            insight_id: fields.insight_id,
            git_repo: self.git_repo,
            git_branch: self.git_branch,
            git_run_tag: self.git_run_tag,
            git_commit_hash: None,
            git_commit_author: None,
            git_commit_timestamp: None,
            git_commit_source: None,
            schema_version: None,
            created_at: None,
            updated_at: None,
        }
    }
}
