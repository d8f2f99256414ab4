//! Mapping between [`Run`]/[`RunEvent`] and SQLite rows.

use chrono::{DateTime, Utc};
use rusqlite::Row;

use telemetry_core::{GitCommitSource, Run, RunEvent, RunStatus};

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_dt_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| parse_dt(&s))
}

pub fn run_from_row(row: &Row) -> rusqlite::Result<Run> {
    let status_raw: String = row.get("status")?;
    let start_time_raw: String = row.get("start_time")?;
    let end_time_raw: Option<String> = row.get("end_time")?;
    let git_commit_timestamp_raw: Option<String> = row.get("git_commit_timestamp")?;
    let git_commit_source_raw: Option<String> = row.get("git_commit_source")?;
    let created_at_raw: String = row.get("created_at")?;
    let updated_at_raw: String = row.get("updated_at")?;

    Ok(Run {
        event_id: row.get("event_id")?,
        run_id: row.get("run_id")?,
        agent_name: row.get("agent_name")?,
        job_type: row.get("job_type")?,
        trigger_type: row.get("trigger_type")?,
        start_time: parse_dt(&start_time_raw),
        end_time: parse_dt_opt(end_time_raw),
        status: RunStatus::parse_normalized(&status_raw).unwrap_or(RunStatus::Failure),
        duration_ms: row.get("duration_ms")?,
        items_discovered: row.get("items_discovered")?,
        items_succeeded: row.get("items_succeeded")?,
        items_failed: row.get("items_failed")?,
        input_summary: row.get("input_summary")?,
        output_summary: row.get("output_summary")?,
        error_summary: row.get("error_summary")?,
        error_details: row.get("error_details")?,
        metrics_json: row.get("metrics_json")?,
        context_json: row.get("context_json")?,
        product: row.get("product")?,
        platform: row.get("platform")?,
        product_family: row.get("product_family")?,
        website: row.get("website")?,
        website_section: row.get("website_section")?,
        item_name: row.get("item_name")?,
        insight_id: row.get("insight_id")?,
        git_repo: row.get("git_repo")?,
        git_branch: row.get("git_branch")?,
        git_run_tag: row.get("git_run_tag")?,
        git_commit_hash: row.get("git_commit_hash")?,
        git_commit_author: row.get("git_commit_author")?,
        git_commit_timestamp: parse_dt_opt(git_commit_timestamp_raw),
        git_commit_source: git_commit_source_raw.and_then(|s| GitCommitSource::parse(&s)),
        schema_version: row.get("schema_version")?,
        created_at: parse_dt(&created_at_raw),
        updated_at: parse_dt(&updated_at_raw),
    })
}

pub fn run_event_from_row(row: &Row) -> rusqlite::Result<RunEvent> {
    let timestamp_raw: String = row.get("timestamp")?;
    Ok(RunEvent {
        run_id: row.get("run_id")?,
        event_type: row.get("event_type")?,
        timestamp: parse_dt(&timestamp_raw),
        message: row.get("message")?,
        metadata_json: row.get("metadata_json")?,
    })
}

pub const RUN_COLUMNS: &str = "event_id, run_id, agent_name, job_type, trigger_type, \
    start_time, end_time, status, duration_ms, items_discovered, items_succeeded, \
    items_failed, input_summary, output_summary, error_summary, error_details, \
    metrics_json, context_json, product, platform, product_family, website, \
    website_section, item_name, insight_id, git_repo, git_branch, git_run_tag, \
    git_commit_hash, git_commit_author, git_commit_timestamp, git_commit_source, \
    schema_version, created_at, updated_at";
