//! The [`Run`] and [`RunEvent`] entities (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::RunStatus;

/// Current schema version written by new rows (spec §3, GLOSSARY).
pub const CURRENT_SCHEMA_VERSION: i64 = 6;

/// Restricted enum for `git_commit_source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitCommitSource {
    Manual,
    Llm,
    Ci,
}

impl GitCommitSource {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "manual" => Some(GitCommitSource::Manual),
            "llm" => Some(GitCommitSource::Llm),
            "ci" => Some(GitCommitSource::Ci),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GitCommitSource::Manual => "manual",
            GitCommitSource::Llm => "llm",
            GitCommitSource::Ci => "ci",
        }
    }
}

/// One unit of agent work. Mirrors the wire shape POSTed to
/// `/api/v1/runs` and the row stored in `runs` (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub event_id: String,
    pub run_id: String,
    pub agent_name: String,
    pub job_type: String,
    pub trigger_type: String,

    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_time: Option<DateTime<Utc>>,

    pub status: RunStatus,
    pub duration_ms: i64,

    pub items_discovered: i64,
    pub items_succeeded: i64,
    pub items_failed: i64,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub input_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metrics_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context_json: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub product_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub website_section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub item_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub insight_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub git_repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub git_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub git_run_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub git_commit_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub git_commit_author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub git_commit_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub git_commit_source: Option<GitCommitSource>,

    pub schema_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw POST body for a Run submission, before canonicalization (spec §4.B
/// "Canonicalization pre-write"). `status` and `git_commit_source` are left
/// as strings here because an invalid value must surface as a validation
/// error, not a deserialization panic; `created_at`/`updated_at`/
/// `schema_version` are optional because the server fills them in when
/// absent.
#[derive(Debug, Clone, Deserialize)]
pub struct RunInput {
    pub event_id: String,
    pub run_id: String,
    pub agent_name: String,
    pub job_type: String,
    pub trigger_type: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub status: String,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub items_discovered: i64,
    #[serde(default)]
    pub items_succeeded: i64,
    #[serde(default)]
    pub items_failed: i64,
    #[serde(default)]
    pub input_summary: Option<String>,
    #[serde(default)]
    pub output_summary: Option<String>,
    #[serde(default)]
    pub error_summary: Option<String>,
    #[serde(default)]
    pub error_details: Option<String>,
    #[serde(default)]
    pub metrics_json: Option<String>,
    #[serde(default)]
    pub context_json: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub product_family: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub website_section: Option<String>,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub insight_id: Option<String>,
    #[serde(default)]
    pub git_repo: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub git_run_tag: Option<String>,
    #[serde(default)]
    pub git_commit_hash: Option<String>,
    #[serde(default)]
    pub git_commit_author: Option<String>,
    #[serde(default)]
    pub git_commit_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub git_commit_source: Option<String>,
    #[serde(default)]
    pub schema_version: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial update body for `PATCH /api/v1/runs/{event_id}` (spec §4.B).
///
/// Every field is `Option<Option<T>>`-shaped via `serde_json::Value`
/// semantics at the transport layer: an absent key leaves the column
/// unchanged, an explicit `null` clears it (only where nullable),
/// resolved in `telemetry_core::canonicalize_patch`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_discovered: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_succeeded: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_failed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_summary: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_summary: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_summary: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_json: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_json: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_family: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_section: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_run_tag: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit_hash: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit_author: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit_timestamp: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit_source: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<i64>,
}

/// Append-only sub-event within a run (spec §3). Not idempotent, not
/// targeted by upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata_json: Option<String>,
}

/// One applied migration (spec §3: `(version, description, applied_at)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMigration {
    pub version: i64,
    pub description: String,
    pub applied_at: DateTime<Utc>,
}
