//! Idempotent write engine (spec §4.B).

use rusqlite::params;
use tracing::error;

use telemetry_concurrency::WriterSerializer;
use telemetry_core::{canonicalize_insert, canonicalize_patch, Error, Result, Run, RunInput, RunPatch};
use telemetry_storage::{run_from_row, Store, RUN_COLUMNS};

use crate::retry::{with_retry, RetryConfig};

/// Outcome of [`WriteEngine::insert`] (spec §6 `POST /api/v1/runs`).
#[derive(Debug)]
pub enum InsertOutcome {
    Created(Run),
    Duplicate(Run),
}

/// Outcome of [`WriteEngine::patch`] (spec §6 `PATCH /api/v1/runs/{event_id}`).
#[derive(Debug)]
pub enum PatchOutcome {
    Updated { run: Run, fields_updated: Vec<String> },
    NotFound,
}

/// Per-record outcome inside a [`BatchResult`].
#[derive(Debug)]
pub enum BatchRecordOutcome {
    Inserted,
    Duplicate,
    Error { reason: String },
}

/// Aggregate + per-record result of [`WriteEngine::batch`] (spec §6
/// `POST /api/v1/runs/batch`).
#[derive(Debug)]
pub struct BatchResult {
    pub inserted: usize,
    pub duplicates: usize,
    pub errors: Vec<(usize, Option<String>, String)>,
    pub total: usize,
}

/// Default number of records grouped into one transaction during a batch
/// insert (spec §4.B "Transaction discipline").
pub const DEFAULT_BATCH_TRANSACTION_SIZE: usize = 100;

pub struct WriteEngine<'a> {
    writer: &'a WriterSerializer,
    retry: RetryConfig,
    batch_transaction_size: usize,
}

impl<'a> WriteEngine<'a> {
    pub fn new(writer: &'a WriterSerializer) -> Self {
        WriteEngine {
            writer,
            retry: RetryConfig::default(),
            batch_transaction_size: DEFAULT_BATCH_TRANSACTION_SIZE,
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_transaction_size(mut self, size: usize) -> Self {
        self.batch_transaction_size = size.max(1);
        self
    }

    /// Upsert keyed on `event_id` (spec §4.B `insert`). Validation errors
    /// are never retried; busy/locked errors are retried up to
    /// `retry.max_retries`.
    pub fn insert(&self, input: RunInput) -> Result<InsertOutcome> {
        let run = canonicalize_insert(input)?;
        with_retry(&self.retry, || self.insert_once(&run))
    }

    fn insert_once(&self, run: &Run) -> Result<InsertOutcome> {
        self.writer.with_store(|store| insert_row(store, run))
    }

    /// Merge `partial` onto the existing row for `event_id` (spec §4.B
    /// `patch`).
    pub fn patch(&self, event_id: &str, partial: RunPatch) -> Result<PatchOutcome> {
        with_retry(&self.retry, || self.patch_once(event_id, partial.clone()))
    }

    fn patch_once(&self, event_id: &str, partial: RunPatch) -> Result<PatchOutcome> {
        self.writer.with_store(|store| {
            let conn = store.connection();
            let existing = fetch_run(conn, event_id)?;
            let Some(mut run) = existing else {
                return Ok(PatchOutcome::NotFound);
            };

            let fields_updated = canonicalize_patch(&mut run, partial)?;
            if fields_updated.is_empty() {
                return Ok(PatchOutcome::Updated {
                    run,
                    fields_updated,
                });
            }

            update_row(conn, &run)?;
            Ok(PatchOutcome::Updated { run, fields_updated })
        })
    }

    /// Ordered best-effort batch insertion (spec §4.B `batch`, §5 "within a
    /// batch, records are applied in submitted order"). Records are
    /// grouped into transactions of `batch_transaction_size` to amortize
    /// fsync while bounding blast-radius on a mid-batch storage error; one
    /// bad record never aborts the batch.
    pub fn batch(&self, inputs: Vec<RunInput>) -> BatchResult {
        let total = inputs.len();
        let mut inserted = 0usize;
        let mut duplicates = 0usize;
        let mut errors = Vec::new();

        // Canonicalize up front so a validation failure never touches the
        // store and is classified purely locally.
        let mut canonical: Vec<Option<(usize, Run)>> = Vec::with_capacity(total);
        for (idx, input) in inputs.into_iter().enumerate() {
            match canonicalize_insert(input) {
                Ok(run) => canonical.push(Some((idx, run))),
                Err(e) => {
                    errors.push((idx, None, e.class().to_string()));
                    canonical.push(None);
                }
            }
        }

        for chunk in canonical.chunks(self.batch_transaction_size) {
            let chunk_runs: Vec<&(usize, Run)> = chunk.iter().filter_map(|c| c.as_ref()).collect();
            if chunk_runs.is_empty() {
                continue;
            }

            let outcome = with_retry(&self.retry, || {
                self.writer.with_store(|store| batch_insert_chunk(store, &chunk_runs))
            });

            match outcome {
                Ok(results) => {
                    for (idx, outcome) in results {
                        match outcome {
                            BatchRecordOutcome::Inserted => inserted += 1,
                            BatchRecordOutcome::Duplicate => duplicates += 1,
                            BatchRecordOutcome::Error { reason } => {
                                errors.push((idx, None, reason));
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "batch chunk failed entirely after retries");
                    for (idx, _run) in &chunk_runs {
                        errors.push((*idx, None, e.class().to_string()));
                    }
                }
            }
        }

        errors.sort_by_key(|(idx, _, _)| *idx);

        BatchResult {
            inserted,
            duplicates,
            errors,
            total,
        }
    }
}

fn batch_insert_chunk(
    store: &mut Store,
    chunk: &[&(usize, Run)],
) -> Result<Vec<(usize, BatchRecordOutcome)>> {
    let conn = store.connection_mut();
    let tx = conn.unchecked_transaction().map_err(|e| Error::Store(e.to_string()))?;
    let mut results = Vec::with_capacity(chunk.len());

    for (idx, run) in chunk {
        match insert_row_tx(&tx, run) {
            Ok(InsertOutcome::Created(_)) => results.push((*idx, BatchRecordOutcome::Inserted)),
            Ok(InsertOutcome::Duplicate(_)) => results.push((*idx, BatchRecordOutcome::Duplicate)),
            Err(e) => results.push((*idx, BatchRecordOutcome::Error { reason: e.class().to_string() })),
        }
    }

    tx.commit().map_err(|e| Error::Store(e.to_string()))?;
    Ok(results)
}

fn insert_row(store: &mut Store, run: &Run) -> Result<InsertOutcome> {
    let conn = store.connection();
    insert_row_tx(conn, run)
}

fn insert_row_tx(conn: &rusqlite::Connection, run: &Run) -> Result<InsertOutcome> {
    let sql = format!(
        "INSERT OR IGNORE INTO runs ({RUN_COLUMNS}) VALUES (\
            ?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,\
            ?23,?24,?25,?26,?27,?28,?29,?30,?31,?32,?33,?34,?35)"
    );

    let changed = conn
        .execute(
            &sql,
            params![
                run.event_id,
                run.run_id,
                run.agent_name,
                run.job_type,
                run.trigger_type,
                run.start_time.to_rfc3339(),
                run.end_time.map(|t| t.to_rfc3339()),
                run.status.as_str(),
                run.duration_ms,
                run.items_discovered,
                run.items_succeeded,
                run.items_failed,
                run.input_summary,
                run.output_summary,
                run.error_summary,
                run.error_details,
                run.metrics_json,
                run.context_json,
                run.product,
                run.platform,
                run.product_family,
                run.website,
                run.website_section,
                run.item_name,
                run.insight_id,
                run.git_repo,
                run.git_branch,
                run.git_run_tag,
                run.git_commit_hash,
                run.git_commit_author,
                run.git_commit_timestamp.map(|t| t.to_rfc3339()),
                run.git_commit_source.map(|s| s.as_str()),
                run.schema_version,
                run.created_at.to_rfc3339(),
                run.updated_at.to_rfc3339(),
            ],
        )
        .map_err(map_insert_err)?;

    if changed == 1 {
        return Ok(InsertOutcome::Created(run.clone()));
    }

    // Conflict on event_id: the existing row is never mutated by a
    // duplicate POST (spec §4.B "Duplicate semantics").
    let existing = fetch_run(conn, &run.event_id)?.ok_or_else(|| {
        Error::Store("insert ignored but no existing row found".to_string())
    })?;
    Ok(InsertOutcome::Duplicate(existing))
}

fn map_insert_err(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::DatabaseBusy
                || inner.code == rusqlite::ErrorCode::DatabaseLocked =>
        {
            Error::Busy
        }
        _ => Error::Store(e.to_string()),
    }
}

fn fetch_run(conn: &rusqlite::Connection, event_id: &str) -> Result<Option<Run>> {
    let sql = format!("SELECT {RUN_COLUMNS} FROM runs WHERE event_id = ?1");
    let mut stmt = conn.prepare(&sql).map_err(|e| Error::Store(e.to_string()))?;
    let mut rows = stmt
        .query_map(params![event_id], run_from_row)
        .map_err(|e| Error::Store(e.to_string()))?;
    match rows.next() {
        Some(r) => Ok(Some(r.map_err(|e| Error::Store(e.to_string()))?)),
        None => Ok(None),
    }
}

fn update_row(conn: &rusqlite::Connection, run: &Run) -> Result<()> {
    conn.execute(
        "UPDATE runs SET run_id=?2, agent_name=?3, job_type=?4, trigger_type=?5, \
         start_time=?6, end_time=?7, status=?8, duration_ms=?9, items_discovered=?10, \
         items_succeeded=?11, items_failed=?12, input_summary=?13, output_summary=?14, \
         error_summary=?15, error_details=?16, metrics_json=?17, context_json=?18, \
         product=?19, platform=?20, product_family=?21, website=?22, website_section=?23, \
         item_name=?24, insight_id=?25, git_repo=?26, git_branch=?27, git_run_tag=?28, \
         git_commit_hash=?29, git_commit_author=?30, git_commit_timestamp=?31, \
         git_commit_source=?32, schema_version=?33, updated_at=?34 \
         WHERE event_id = ?1",
        params![
            run.event_id,
            run.run_id,
            run.agent_name,
            run.job_type,
            run.trigger_type,
            run.start_time.to_rfc3339(),
            run.end_time.map(|t| t.to_rfc3339()),
            run.status.as_str(),
            run.duration_ms,
            run.items_discovered,
            run.items_succeeded,
            run.items_failed,
            run.input_summary,
            run.output_summary,
            run.error_summary,
            run.error_details,
            run.metrics_json,
            run.context_json,
            run.product,
            run.platform,
            run.product_family,
            run.website,
            run.website_section,
            run.item_name,
            run.insight_id,
            run.git_repo,
            run.git_branch,
            run.git_run_tag,
            run.git_commit_hash,
            run.git_commit_author,
            run.git_commit_timestamp.map(|t| t.to_rfc3339()),
            run.git_commit_source.map(|s| s.as_str()),
            run.schema_version,
            run.updated_at.to_rfc3339(),
        ],
    )
    .map_err(|e| Error::Store(e.to_string()))?;
    Ok(())
}
