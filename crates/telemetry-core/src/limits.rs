//! Size bounds for bounded string/JSON fields (spec §3).
//!
//! These are deliberately generous — they exist to stop a single pathological
//! submission from ballooning the store, not to constrain normal payloads.

/// Maximum length, in bytes, of a single-line summary field
/// (`input_summary`, `output_summary`, `error_summary`).
pub const MAX_SUMMARY_BYTES: usize = 16 * 1024;

/// Maximum length, in bytes, of `error_details`.
pub const MAX_ERROR_DETAILS_BYTES: usize = 64 * 1024;

/// Maximum length, in bytes, of `metrics_json` / `context_json`.
pub const MAX_JSON_DOC_BYTES: usize = 256 * 1024;

/// Maximum length, in bytes, of short identifier-like fields (agent_name,
/// job_type, run_id, taxonomy fields, ...).
pub const MAX_IDENTIFIER_BYTES: usize = 512;
