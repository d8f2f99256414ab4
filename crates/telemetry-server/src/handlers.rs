//! Request handlers (spec §4.D, §6). Each request: parse body, dispatch
//! to the write/query engine on a blocking thread (rusqlite is
//! synchronous), map the result to an HTTP status, and emit one
//! structured log line.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use tracing::info;

use telemetry_core::{Error, Result, Run, RunInput, RunPatch};
use telemetry_engine::{
    AggregateGroup, Grouping, InsertOutcome, Page, PatchOutcome, QueryEngine, RunFilter,
    WriteEngine,
};
use telemetry_storage::Store;

use crate::dto::{
    AggregateQuery, BatchErrorEntry, BatchResponse, HealthResponse, InsertResponse,
    ListRunsQuery, ListRunsResponse, MetadataResponse, MetricsResponse, PatchResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

fn open_reader(state: &AppState) -> Result<Store> {
    Store::open_reader(&state.0.db_path, &state.0.pragma)
}

fn log_request(endpoint: &str, started: Instant, result_class: &str, error_class: Option<&str>) {
    info!(
        endpoint,
        latency_ms = started.elapsed().as_millis() as u64,
        result = result_class,
        error = error_class.unwrap_or(""),
        "request handled"
    );
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION").to_string(),
        db_path: state.0.db_path.display().to_string(),
    })
}

pub async fn metrics(State(state): State<AppState>) -> Result<Json<MetricsResponse>, ApiError> {
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || -> Result<MetricsResponse> {
        let reader = open_reader(&state)?;
        let query = QueryEngine::new(&reader);
        let meta = query.metadata()?;
        let mut agents = std::collections::BTreeMap::new();
        let mut total = 0i64;
        for agent_name in &meta.agent_names {
            let filter = RunFilter {
                agent_name: Some(agent_name.clone()),
                ..Default::default()
            };
            let count = query
                .aggregate(Grouping::AgentName, &filter)?
                .into_iter()
                .map(|g: AggregateGroup| g.count)
                .sum::<i64>();
            agents.insert(agent_name.clone(), count);
            total += count;
        }
        Ok(MetricsResponse {
            total_runs: total,
            agents,
        })
    })
    .await
    .expect("blocking task panicked");

    match result {
        Ok(body) => {
            log_request("GET /metrics", started, "ok", None);
            Ok(Json(body))
        }
        Err(e) => {
            log_request("GET /metrics", started, "error", Some(e.class()));
            Err(e.into())
        }
    }
}

pub async fn create_run(
    State(state): State<AppState>,
    Json(input): Json<RunInput>,
) -> Result<Json<InsertResponse>, ApiError> {
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || -> Result<InsertOutcome> {
        let writer = &state.0.writer;
        WriteEngine::new(writer)
            .with_retry_config(state.0.retry)
            .insert(input)
    })
    .await
    .expect("blocking task panicked");

    match result {
        Ok(InsertOutcome::Created(run)) => {
            log_request("POST /api/v1/runs", started, "created", None);
            Ok(Json(InsertResponse::Created {
                event_id: run.event_id,
                run_id: run.run_id,
            }))
        }
        Ok(InsertOutcome::Duplicate(run)) => {
            log_request("POST /api/v1/runs", started, "duplicate", None);
            Ok(Json(InsertResponse::Duplicate {
                event_id: run.event_id,
                run_id: run.run_id,
            }))
        }
        Err(e) => {
            log_request("POST /api/v1/runs", started, "error", Some(e.class()));
            Err(e.into())
        }
    }
}

pub async fn create_runs_batch(
    State(state): State<AppState>,
    Json(inputs): Json<Vec<RunInput>>,
) -> Json<BatchResponse> {
    let started = Instant::now();
    let batch_size = state.0.batch_transaction_size;
    let result = tokio::task::spawn_blocking(move || {
        let writer = &state.0.writer;
        WriteEngine::new(writer)
            .with_retry_config(state.0.retry)
            .with_batch_transaction_size(batch_size)
            .batch(inputs)
    })
    .await
    .expect("blocking task panicked");

    log_request(
        "POST /api/v1/runs/batch",
        started,
        "ok",
        (!result.errors.is_empty()).then_some("partial"),
    );

    Json(BatchResponse {
        inserted: result.inserted,
        duplicates: result.duplicates,
        total: result.total,
        errors: result
            .errors
            .into_iter()
            .map(|(index, event_id, reason)| BatchErrorEntry {
                index,
                event_id,
                reason,
            })
            .collect(),
    })
}

pub async fn list_runs(
    State(state): State<AppState>,
    Query(q): Query<ListRunsQuery>,
) -> Result<Json<ListRunsResponse>, ApiError> {
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || -> Result<ListRunsResponse> {
        let reader = open_reader(&state)?;
        let query = QueryEngine::new(&reader);
        let filter = RunFilter {
            agent_name: q.agent_name,
            job_type: q.job_type,
            status: q.status,
            start_from: q.start_from,
            start_to: q.start_to,
            website: q.website,
            website_section: q.website_section,
            product_family: q.product_family,
            text: None,
        };
        let page = Page {
            limit: q.limit.unwrap_or(50),
            cursor: q.cursor,
        };
        let result = query.list_runs(&filter, &page)?;
        Ok(ListRunsResponse {
            items: result.items,
            next_cursor: result.next_cursor,
        })
    })
    .await
    .expect("blocking task panicked");

    match result {
        Ok(body) => {
            log_request("GET /api/v1/runs", started, "ok", None);
            Ok(Json(body))
        }
        Err(e) => {
            log_request("GET /api/v1/runs", started, "error", Some(e.class()));
            Err(e.into())
        }
    }
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<Run>, ApiError> {
    let started = Instant::now();
    let result = tokio::task::spawn_blocking({
        let event_id = event_id.clone();
        move || -> Result<Option<Run>> {
            let reader = open_reader(&state)?;
            QueryEngine::new(&reader).get_run(&event_id)
        }
    })
    .await
    .expect("blocking task panicked");

    match result {
        Ok(Some(run)) => {
            log_request("GET /api/v1/runs/:event_id", started, "ok", None);
            Ok(Json(run))
        }
        Ok(None) => {
            log_request("GET /api/v1/runs/:event_id", started, "not_found", None);
            Err(Error::NotFound { event_id }.into())
        }
        Err(e) => {
            log_request(
                "GET /api/v1/runs/:event_id",
                started,
                "error",
                Some(e.class()),
            );
            Err(e.into())
        }
    }
}

pub async fn patch_run(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(patch): Json<RunPatch>,
) -> Result<Json<PatchResponse>, ApiError> {
    let started = Instant::now();
    let result = tokio::task::spawn_blocking({
        let event_id = event_id.clone();
        move || -> Result<PatchOutcome> {
            let writer = &state.0.writer;
            WriteEngine::new(writer)
                .with_retry_config(state.0.retry)
                .patch(&event_id, patch)
        }
    })
    .await
    .expect("blocking task panicked");

    match result {
        Ok(PatchOutcome::Updated { fields_updated, .. }) => {
            log_request("PATCH /api/v1/runs/:event_id", started, "updated", None);
            Ok(Json(PatchResponse::Updated { fields_updated }))
        }
        Ok(PatchOutcome::NotFound) => {
            log_request("PATCH /api/v1/runs/:event_id", started, "not_found", None);
            Err(Error::NotFound { event_id }.into())
        }
        Err(e) => {
            log_request(
                "PATCH /api/v1/runs/:event_id",
                started,
                "error",
                Some(e.class()),
            );
            Err(e.into())
        }
    }
}

pub async fn metadata(State(state): State<AppState>) -> Result<Json<MetadataResponse>, ApiError> {
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || -> Result<MetadataResponse> {
        let reader = open_reader(&state)?;
        let meta = QueryEngine::new(&reader).metadata()?;
        Ok(MetadataResponse {
            agent_names: meta.agent_names,
            job_types: meta.job_types,
            products: meta.products,
            platforms: meta.platforms,
            product_families: meta.product_families,
            websites: meta.websites,
        })
    })
    .await
    .expect("blocking task panicked");

    match result {
        Ok(body) => {
            log_request("GET /api/v1/metadata", started, "ok", None);
            Ok(Json(body))
        }
        Err(e) => {
            log_request("GET /api/v1/metadata", started, "error", Some(e.class()));
            Err(e.into())
        }
    }
}

pub async fn aggregate(
    State(state): State<AppState>,
    Query(q): Query<AggregateQuery>,
) -> Result<Json<Vec<AggregateGroup>>, ApiError> {
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || -> Result<Vec<AggregateGroup>> {
        let grouping = match q.grouping.as_str() {
            "date" => Grouping::Date,
            "agent_name" => Grouping::AgentName,
            "website" => Grouping::Website,
            "website_section" => Grouping::WebsiteSection,
            "product_family" => Grouping::ProductFamily,
            other => {
                return Err(Error::validation(
                    "grouping",
                    format!("unknown grouping: {other}"),
                ))
            }
        };
        let filter = RunFilter {
            agent_name: q.agent_name,
            job_type: q.job_type,
            status: q.status,
            start_from: q.start_from,
            start_to: q.start_to,
            website: q.website,
            website_section: q.website_section,
            product_family: q.product_family,
            text: None,
        };
        let reader = open_reader(&state)?;
        QueryEngine::new(&reader).aggregate(grouping, &filter)
    })
    .await
    .expect("blocking task panicked");

    match result {
        Ok(groups) => {
            log_request("GET /api/v1/aggregate", started, "ok", None);
            Ok(Json(groups))
        }
        Err(e) => {
            log_request("GET /api/v1/aggregate", started, "error", Some(e.class()));
            Err(e.into())
        }
    }
}
