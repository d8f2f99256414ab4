//! Wire shapes for the HTTP surface (spec §6). Request bodies reuse
//! `telemetry_core::{RunInput, RunPatch}` directly; this module holds the
//! response envelopes and the `GET /api/v1/runs` query-string shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use telemetry_core::Run;

#[derive(Debug, Serialize)]
#[serde(tag = "status")]
pub enum InsertResponse {
    #[serde(rename = "created")]
    Created { event_id: String, run_id: String },
    #[serde(rename = "duplicate")]
    Duplicate { event_id: String, run_id: String },
}

#[derive(Debug, Serialize)]
pub struct BatchErrorEntry {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub inserted: usize,
    pub duplicates: usize,
    pub errors: Vec<BatchErrorEntry>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status")]
pub enum PatchResponse {
    #[serde(rename = "updated")]
    Updated { fields_updated: Vec<String> },
}

/// Query-string parameters accepted by `GET /api/v1/runs` (spec §6).
#[derive(Debug, Deserialize, Default)]
pub struct ListRunsQuery {
    pub agent_name: Option<String>,
    pub job_type: Option<String>,
    pub status: Option<String>,
    pub start_from: Option<DateTime<Utc>>,
    pub start_to: Option<DateTime<Utc>>,
    pub website: Option<String>,
    pub website_section: Option<String>,
    pub product_family: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListRunsResponse {
    pub items: Vec<Run>,
    pub next_cursor: Option<String>,
}

/// Query-string parameters accepted by `GET /api/v1/aggregate` (spec
/// §4.C `aggregate`, exposed as an extra read endpoint beyond the §6
/// enumerated list since the module names the operation explicitly).
#[derive(Debug, Deserialize, Default)]
pub struct AggregateQuery {
    pub grouping: String,
    pub agent_name: Option<String>,
    pub job_type: Option<String>,
    pub status: Option<String>,
    pub start_from: Option<DateTime<Utc>>,
    pub start_to: Option<DateTime<Utc>>,
    pub website: Option<String>,
    pub website_section: Option<String>,
    pub product_family: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub agent_names: Vec<String>,
    pub job_types: Vec<String>,
    pub products: Vec<String>,
    pub platforms: Vec<String>,
    pub product_families: Vec<String>,
    pub websites: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub db_path: String,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub total_runs: i64,
    pub agents: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
}
