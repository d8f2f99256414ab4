//! Fixture builder for cross-crate tests, grounded on the teacher's own
//! `durability::testing` helper module used for the same purpose. Gated
//! behind the `testing` feature so `telemetry-storage`, `telemetry-engine`,
//! and `telemetry-server` can depend on it from `dev-dependencies` without
//! pulling it into release builds.

use chrono::Utc;
use uuid::Uuid;

use crate::run::{Run, RunInput, CURRENT_SCHEMA_VERSION};

/// Builds a minimal, valid [`RunInput`] with a fresh random `event_id`,
/// ready to feed through `canonicalize_insert` or POST directly.
pub fn sample_run_input(agent_name: &str) -> RunInput {
    let now = Utc::now();
    RunInput {
        event_id: Uuid::new_v4().to_string(),
        run_id: format!("run-{}", Uuid::new_v4()),
        agent_name: agent_name.to_string(),
        job_type: "scrape".to_string(),
        trigger_type: "cron".to_string(),
        start_time: now,
        end_time: None,
        status: "running".to_string(),
        duration_ms: 0,
        items_discovered: 0,
        items_succeeded: 0,
        items_failed: 0,
        input_summary: None,
        output_summary: None,
        error_summary: None,
        error_details: None,
        metrics_json: None,
        context_json: None,
        product: None,
        platform: None,
        product_family: None,
        website: None,
        website_section: None,
        item_name: None,
        insight_id: None,
        git_repo: None,
        git_branch: None,
        git_run_tag: None,
        git_commit_hash: None,
        git_commit_author: None,
        git_commit_timestamp: None,
        git_commit_source: None,
        schema_version: Some(CURRENT_SCHEMA_VERSION),
        created_at: None,
        updated_at: None,
    }
}

/// Same as [`sample_run_input`] but already canonicalized into a [`Run`].
pub fn sample_run(agent_name: &str) -> Run {
    crate::canonicalize_insert(sample_run_input(agent_name)).expect("sample input is always valid")
}
