//! Pre-write canonicalization for inserts and patches (spec §4.B).
//!
//! This is the single place that trims strings, normalizes `status`
//! aliases, defaults `schema_version`/`created_at`/`updated_at`, and
//! validates `git_commit_source`. Both `telemetry-engine` (server-side
//! writes) and `telemetry-client` (so a buffered NDJSON record is already
//! canonical before it is replayed) call through here, so there is exactly
//! one alias table in the whole system (spec §8: "∀ status alias a in the
//! mapping table...").

use chrono::Utc;

use crate::error::{Error, Result};
use crate::limits;
use crate::run::{GitCommitSource, Run, RunInput, RunPatch, CURRENT_SCHEMA_VERSION};
use crate::status::RunStatus;

fn trim_opt(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.len() > max {
        return Err(Error::validation(
            field,
            format!("exceeds maximum length of {max} bytes"),
        ));
    }
    Ok(())
}

/// Canonicalize a raw POST body into a storable [`Run`], applying every
/// rule in spec §4.B "Canonicalization pre-write".
pub fn canonicalize_insert(input: RunInput) -> Result<Run> {
    if input.event_id.trim().is_empty() {
        return Err(Error::validation("event_id", "must not be empty"));
    }
    if input.run_id.trim().is_empty() {
        return Err(Error::validation("run_id", "must not be empty"));
    }

    let status = RunStatus::parse_normalized(&input.status)
        .ok_or_else(|| Error::validation("status", format!("unknown status: {}", input.status)))?;

    if let Some(end) = input.end_time {
        if input.start_time > end {
            return Err(Error::validation("end_time", "must not precede start_time"));
        }
    }

    if input.duration_ms < 0 {
        return Err(Error::validation("duration_ms", "must be >= 0"));
    }
    for (field, v) in [
        ("items_discovered", input.items_discovered),
        ("items_succeeded", input.items_succeeded),
        ("items_failed", input.items_failed),
    ] {
        if v < 0 {
            return Err(Error::validation(field, "must be >= 0"));
        }
    }

    let git_commit_source = match input.git_commit_source.as_deref() {
        None => None,
        Some(raw) => Some(
            GitCommitSource::parse(raw)
                .ok_or_else(|| Error::validation("git_commit_source", format!("invalid source: {raw}")))?,
        ),
    };

    if let Some(s) = &input.input_summary {
        check_len("input_summary", s, limits::MAX_SUMMARY_BYTES)?;
    }
    if let Some(s) = &input.output_summary {
        check_len("output_summary", s, limits::MAX_SUMMARY_BYTES)?;
    }
    if let Some(s) = &input.error_summary {
        check_len("error_summary", s, limits::MAX_SUMMARY_BYTES)?;
    }
    if let Some(s) = &input.error_details {
        check_len("error_details", s, limits::MAX_ERROR_DETAILS_BYTES)?;
    }
    if let Some(s) = &input.metrics_json {
        check_len("metrics_json", s, limits::MAX_JSON_DOC_BYTES)?;
    }
    if let Some(s) = &input.context_json {
        check_len("context_json", s, limits::MAX_JSON_DOC_BYTES)?;
    }

    let now = Utc::now();

    Ok(Run {
        event_id: input.event_id.trim().to_string(),
        run_id: input.run_id.trim().to_string(),
        agent_name: input.agent_name.trim().to_string(),
        job_type: input.job_type.trim().to_string(),
        trigger_type: input.trigger_type.trim().to_string(),
        start_time: input.start_time,
        end_time: input.end_time,
        status,
        duration_ms: input.duration_ms,
        items_discovered: input.items_discovered,
        items_succeeded: input.items_succeeded,
        items_failed: input.items_failed,
        input_summary: trim_opt(input.input_summary),
        output_summary: trim_opt(input.output_summary),
        error_summary: trim_opt(input.error_summary),
        error_details: trim_opt(input.error_details),
        metrics_json: input.metrics_json,
        context_json: input.context_json,
        product: trim_opt(input.product),
        platform: trim_opt(input.platform),
        product_family: trim_opt(input.product_family),
        website: trim_opt(input.website),
        website_section: trim_opt(input.website_section),
        item_name: trim_opt(input.item_name),
        insight_id: trim_opt(input.insight_id),
        git_repo: trim_opt(input.git_repo),
        git_branch: trim_opt(input.git_branch),
        git_run_tag: trim_opt(input.git_run_tag),
        git_commit_hash: trim_opt(input.git_commit_hash),
        git_commit_author: trim_opt(input.git_commit_author),
        git_commit_timestamp: input.git_commit_timestamp,
        git_commit_source,
        schema_version: input.schema_version.unwrap_or(CURRENT_SCHEMA_VERSION),
        created_at: input.created_at.unwrap_or(now),
        updated_at: input.updated_at.unwrap_or(now),
    })
}

/// One field changed by a PATCH, reported back in the `fields_updated` list
/// of the `200 updated` response (spec §6).
pub type PatchField = &'static str;

/// Apply a [`RunPatch`] onto an existing [`Run`], returning the list of
/// fields that were actually changed. Implements spec §4.B's merge rules:
/// absent key -> no-op, explicit `null` -> clear (nullable fields only),
/// `updated_at` always rewritten, `duration_ms` auto-computed from
/// `start_time`/`end_time` when `end_time` is set and the caller didn't
/// supply `duration_ms` explicitly.
pub fn canonicalize_patch(run: &mut Run, patch: RunPatch) -> Result<Vec<PatchField>> {
    let mut changed = Vec::new();

    macro_rules! set_required {
        ($field:ident, $name:literal) => {
            if let Some(v) = patch.$field {
                run.$field = v.trim().to_string();
                changed.push($name);
            }
        };
    }
    macro_rules! set_nullable_string {
        ($field:ident, $name:literal) => {
            if let Some(opt) = patch.$field {
                run.$field = trim_opt(opt);
                changed.push($name);
            }
        };
    }

    set_required!(agent_name, "agent_name");
    set_required!(job_type, "job_type");
    set_required!(trigger_type, "trigger_type");

    if let Some(start) = patch.start_time {
        run.start_time = start;
        changed.push("start_time");
    }

    let mut end_time_set = false;
    if let Some(end_opt) = patch.end_time {
        if let Some(end) = end_opt {
            if end < run.start_time {
                return Err(Error::validation("end_time", "must not precede start_time"));
            }
        }
        run.end_time = end_opt;
        changed.push("end_time");
        end_time_set = true;
    }

    if let Some(raw_status) = &patch.status {
        let status = RunStatus::parse_normalized(raw_status)
            .ok_or_else(|| Error::validation("status", format!("unknown status: {raw_status}")))?;
        run.status = status;
        changed.push("status");
    }

    if let Some(d) = patch.duration_ms {
        if d < 0 {
            return Err(Error::validation("duration_ms", "must be >= 0"));
        }
        run.duration_ms = d;
        changed.push("duration_ms");
    } else if end_time_set {
        if let Some(end) = run.end_time {
            let delta = end.signed_duration_since(run.start_time);
            let ms = delta.num_milliseconds().max(0);
            run.duration_ms = ms;
            changed.push("duration_ms");
        }
    }

    for (field_changed, value) in [
        ("items_discovered", patch.items_discovered),
        ("items_succeeded", patch.items_succeeded),
        ("items_failed", patch.items_failed),
    ] {
        if let Some(v) = value {
            if v < 0 {
                return Err(Error::validation(field_changed, "must be >= 0"));
            }
        }
    }
    if let Some(v) = patch.items_discovered {
        run.items_discovered = v;
        changed.push("items_discovered");
    }
    if let Some(v) = patch.items_succeeded {
        run.items_succeeded = v;
        changed.push("items_succeeded");
    }
    if let Some(v) = patch.items_failed {
        run.items_failed = v;
        changed.push("items_failed");
    }

    set_nullable_string!(input_summary, "input_summary");
    set_nullable_string!(output_summary, "output_summary");
    set_nullable_string!(error_summary, "error_summary");
    set_nullable_string!(error_details, "error_details");
    if let Some(opt) = patch.metrics_json {
        run.metrics_json = opt;
        changed.push("metrics_json");
    }
    if let Some(opt) = patch.context_json {
        run.context_json = opt;
        changed.push("context_json");
    }
    set_nullable_string!(product, "product");
    set_nullable_string!(platform, "platform");
    set_nullable_string!(product_family, "product_family");
    set_nullable_string!(website, "website");
    set_nullable_string!(website_section, "website_section");
    set_nullable_string!(item_name, "item_name");
    set_nullable_string!(insight_id, "insight_id");
    set_nullable_string!(git_repo, "git_repo");
    set_nullable_string!(git_branch, "git_branch");
    set_nullable_string!(git_run_tag, "git_run_tag");
    set_nullable_string!(git_commit_hash, "git_commit_hash");
    set_nullable_string!(git_commit_author, "git_commit_author");

    if let Some(opt) = patch.git_commit_timestamp {
        run.git_commit_timestamp = opt;
        changed.push("git_commit_timestamp");
    }
    if let Some(opt) = patch.git_commit_source {
        run.git_commit_source = match opt {
            None => None,
            Some(raw) => Some(
                GitCommitSource::parse(&raw)
                    .ok_or_else(|| Error::validation("git_commit_source", format!("invalid source: {raw}")))?,
            ),
        };
        changed.push("git_commit_source");
    }
    if let Some(v) = patch.schema_version {
        run.schema_version = v;
        changed.push("schema_version");
    }

    if !changed.is_empty() {
        run.updated_at = Utc::now();
        changed.push("updated_at");
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_input() -> RunInput {
        RunInput {
            event_id: " E1 ".into(),
            run_id: "R1".into(),
            agent_name: "a".into(),
            job_type: "j".into(),
            trigger_type: "t".into(),
            start_time: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            end_time: None,
            status: "Running".into(),
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
            schema_version: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn trims_event_id_and_defaults_schema_version() {
        let run = canonicalize_insert(sample_input()).unwrap();
        assert_eq!(run.event_id, "E1");
        assert_eq!(run.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(run.status, RunStatus::Running);
    }

    #[test]
    fn status_alias_normalizes() {
        let mut input = sample_input();
        input.status = "failed".into();
        let run = canonicalize_insert(input).unwrap();
        assert_eq!(run.status, RunStatus::Failure);
    }

    #[test]
    fn rejects_unknown_git_commit_source() {
        let mut input = sample_input();
        input.git_commit_source = Some("robot".into());
        assert!(canonicalize_insert(input).is_err());
    }

    #[test]
    fn patch_computes_duration_from_end_time() {
        let mut run = canonicalize_insert(sample_input()).unwrap();
        let patch = RunPatch {
            status: Some("success".into()),
            end_time: Some(Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 2).unwrap())),
            ..Default::default()
        };
        let changed = canonicalize_patch(&mut run, patch).unwrap();
        assert_eq!(run.duration_ms, 2000);
        assert_eq!(run.status, RunStatus::Success);
        assert!(changed.contains(&"duration_ms"));
        assert!(changed.contains(&"updated_at"));
    }

    #[test]
    fn patch_null_clears_nullable_field() {
        let mut run = canonicalize_insert(sample_input()).unwrap();
        run.insight_id = Some("abc".into());
        let patch = RunPatch {
            insight_id: Some(None),
            ..Default::default()
        };
        canonicalize_patch(&mut run, patch).unwrap();
        assert_eq!(run.insight_id, None);
    }

    #[test]
    fn patch_omitted_field_is_noop() {
        let mut run = canonicalize_insert(sample_input()).unwrap();
        run.insight_id = Some("abc".into());
        let patch = RunPatch::default();
        let changed = canonicalize_patch(&mut run, patch).unwrap();
        assert_eq!(run.insight_id, Some("abc".into()));
        assert!(changed.is_empty());
    }

    #[test]
    fn explicit_duration_overrides_computed_one() {
        let mut run = canonicalize_insert(sample_input()).unwrap();
        let patch = RunPatch {
            end_time: Some(Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 2).unwrap())),
            duration_ms: Some(9999),
            ..Default::default()
        };
        canonicalize_patch(&mut run, patch).unwrap();
        assert_eq!(run.duration_ms, 9999);
    }
}
