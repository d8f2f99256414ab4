//! Parameterized reads and aggregates (spec §4.C). Every query here is
//! built with bound parameters — never string-concatenated — per spec's
//! explicit instruction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use serde::Serialize;

use telemetry_core::{Error, Result, RunStatus};
use telemetry_storage::{run_from_row, Store, RUN_COLUMNS};

use crate::cursor::Cursor;
use telemetry_core::Run;

/// Filter accepted by [`QueryEngine::list_runs`] and
/// [`QueryEngine::aggregate`] (spec §6 query params).
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub agent_name: Option<String>,
    pub job_type: Option<String>,
    /// Raw status string; normalized through the same alias table as
    /// writes (spec §8: "querying by a matches rows stored under either").
    pub status: Option<String>,
    pub start_from: Option<DateTime<Utc>>,
    pub start_to: Option<DateTime<Utc>>,
    pub website: Option<String>,
    pub website_section: Option<String>,
    pub product_family: Option<String>,
    /// Free text over `input_summary`/`output_summary`/`error_summary`.
    pub text: Option<String>,
}

impl RunFilter {
    fn push_clauses(&self, clauses: &mut Vec<String>, params: &mut Vec<SqlValue>) -> Result<()> {
        if let Some(a) = &self.agent_name {
            clauses.push("agent_name = ?".to_string());
            params.push(SqlValue::Text(a.clone()));
        }
        if let Some(j) = &self.job_type {
            clauses.push("job_type = ?".to_string());
            params.push(SqlValue::Text(j.clone()));
        }
        if let Some(raw_status) = &self.status {
            let status = RunStatus::parse_normalized(raw_status)
                .ok_or_else(|| Error::validation("status", format!("unknown status: {raw_status}")))?;
            clauses.push("status = ?".to_string());
            params.push(SqlValue::Text(status.as_str().to_string()));
        }
        if let Some(from) = self.start_from {
            clauses.push("start_time >= ?".to_string());
            params.push(SqlValue::Text(from.to_rfc3339()));
        }
        if let Some(to) = self.start_to {
            clauses.push("start_time <= ?".to_string());
            params.push(SqlValue::Text(to.to_rfc3339()));
        }
        if let Some(w) = &self.website {
            clauses.push("website = ?".to_string());
            params.push(SqlValue::Text(w.clone()));
        }
        if let Some(ws) = &self.website_section {
            clauses.push("website_section = ?".to_string());
            params.push(SqlValue::Text(ws.clone()));
        }
        if let Some(pf) = &self.product_family {
            clauses.push("product_family = ?".to_string());
            params.push(SqlValue::Text(pf.clone()));
        }
        if let Some(text) = &self.text {
            clauses.push(
                "(input_summary LIKE ? OR output_summary LIKE ? OR error_summary LIKE ?)".to_string(),
            );
            let pattern = format!("%{}%", text.replace('%', "\\%").replace('_', "\\_"));
            for _ in 0..3 {
                params.push(SqlValue::Text(pattern.clone()));
            }
        }
        Ok(())
    }
}

/// Page request for [`QueryEngine::list_runs`].
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub limit: i64,
    pub cursor: Option<String>,
}

/// Result of [`QueryEngine::list_runs`] (spec §6 `GET /api/v1/runs`).
#[derive(Debug)]
pub struct ListRunsResult {
    pub items: Vec<Run>,
    pub next_cursor: Option<String>,
}

/// Grouping key for [`QueryEngine::aggregate`] (spec §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    Date,
    AgentName,
    Website,
    WebsiteSection,
    ProductFamily,
}

impl Grouping {
    fn column(self) -> &'static str {
        match self {
            Grouping::Date => "substr(start_time, 1, 10)",
            Grouping::AgentName => "agent_name",
            Grouping::Website => "website",
            Grouping::WebsiteSection => "website_section",
            Grouping::ProductFamily => "product_family",
        }
    }
}

/// One aggregate bucket (spec §4.C: "counts, sums of counters, success
/// ratio, status histogram").
#[derive(Debug, Clone, Serialize)]
pub struct AggregateGroup {
    pub key: Option<String>,
    pub count: i64,
    pub items_discovered: i64,
    pub items_succeeded: i64,
    pub items_failed: i64,
    pub success_ratio: f64,
    pub status_histogram: BTreeMap<String, i64>,
}

/// Distinct enumerations used by the dashboard to build filter dropdowns
/// (spec §4.C `metadata()`).
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub agent_names: Vec<String>,
    pub job_types: Vec<String>,
    pub products: Vec<String>,
    pub platforms: Vec<String>,
    pub product_families: Vec<String>,
    pub websites: Vec<String>,
}

/// Parameterized read/aggregate engine over a reader `Store` (spec §4.C).
pub struct QueryEngine<'a> {
    store: &'a Store,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a Store) -> Self {
        QueryEngine { store }
    }

    /// `get_run(event_id)` — spec §6 `GET /api/v1/runs/{event_id}`.
    pub fn get_run(&self, event_id: &str) -> Result<Option<Run>> {
        let sql = format!("SELECT {RUN_COLUMNS} FROM runs WHERE event_id = ?1");
        let conn = self.store.connection();
        let mut stmt = conn.prepare(&sql).map_err(|e| Error::Store(e.to_string()))?;
        let mut rows = stmt
            .query_map(rusqlite::params![event_id], run_from_row)
            .map_err(|e| Error::Store(e.to_string()))?;
        match rows.next() {
            Some(r) => Ok(Some(r.map_err(|e| Error::Store(e.to_string()))?)),
            None => Ok(None),
        }
    }

    /// `list_runs(filter, page, sort)` with stable
    /// `(start_time DESC, event_id DESC)` ordering and opaque cursor
    /// pagination (spec §4.C).
    pub fn list_runs(&self, filter: &RunFilter, page: &Page) -> Result<ListRunsResult> {
        let limit = if page.limit <= 0 { 50 } else { page.limit.min(1000) };

        let mut clauses = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();
        filter.push_clauses(&mut clauses, &mut params)?;

        if let Some(token) = &page.cursor {
            let cursor = Cursor::decode(token)?;
            clauses.push("(start_time < ? OR (start_time = ? AND event_id < ?))".to_string());
            params.push(SqlValue::Text(cursor.start_time.to_rfc3339()));
            params.push(SqlValue::Text(cursor.start_time.to_rfc3339()));
            params.push(SqlValue::Text(cursor.event_id));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT {RUN_COLUMNS} FROM runs {where_sql} \
             ORDER BY start_time DESC, event_id DESC LIMIT ?"
        );
        params.push(SqlValue::Integer(limit + 1));

        let conn = self.store.connection();
        let mut stmt = conn.prepare(&sql).map_err(|e| Error::Store(e.to_string()))?;
        let mut items: Vec<Run> = stmt
            .query_map(params_from_iter(params.iter()), run_from_row)
            .map_err(|e| Error::Store(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Store(e.to_string()))?;

        let next_cursor = if items.len() as i64 > limit {
            items.truncate(limit as usize);
            items.last().map(|last| {
                Cursor {
                    start_time: last.start_time,
                    event_id: last.event_id.clone(),
                }
                .encode()
            })
        } else {
            None
        };

        Ok(ListRunsResult { items, next_cursor })
    }

    /// `aggregate(grouping, filter, window)` (spec §4.C).
    pub fn aggregate(
        &self,
        grouping: Grouping,
        filter: &RunFilter,
    ) -> Result<Vec<AggregateGroup>> {
        let mut clauses = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();
        filter.push_clauses(&mut clauses, &mut params)?;
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let group_col = grouping.column();
        let sql = format!(
            "SELECT {group_col} AS grp, status, COUNT(*), \
             COALESCE(SUM(items_discovered),0), COALESCE(SUM(items_succeeded),0), \
             COALESCE(SUM(items_failed),0) \
             FROM runs {where_sql} GROUP BY grp, status"
        );

        let conn = self.store.connection();
        let mut stmt = conn.prepare(&sql).map_err(|e| Error::Store(e.to_string()))?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(|e| Error::Store(e.to_string()))?;

        let mut groups: BTreeMap<Option<String>, AggregateGroup> = BTreeMap::new();
        for row in rows {
            let (key, status, count, discovered, succeeded, failed) =
                row.map_err(|e| Error::Store(e.to_string()))?;
            let entry = groups.entry(key.clone()).or_insert_with(|| AggregateGroup {
                key: key.clone(),
                count: 0,
                items_discovered: 0,
                items_succeeded: 0,
                items_failed: 0,
                success_ratio: 0.0,
                status_histogram: BTreeMap::new(),
            });
            entry.count += count;
            entry.items_discovered += discovered;
            entry.items_succeeded += succeeded;
            entry.items_failed += failed;
            *entry.status_histogram.entry(status).or_insert(0) += count;
        }

        let mut result: Vec<AggregateGroup> = groups.into_values().collect();
        for g in &mut result {
            let total = g.items_succeeded + g.items_failed;
            g.success_ratio = if total == 0 {
                0.0
            } else {
                g.items_succeeded as f64 / total as f64
            };
        }
        Ok(result)
    }

    /// `metadata()` — distinct values for enumerable columns (spec §4.C).
    pub fn metadata(&self) -> Result<Metadata> {
        let conn = self.store.connection();
        let distinct = |col: &str| -> Result<Vec<String>> {
            let sql = format!("SELECT DISTINCT {col} FROM runs WHERE {col} IS NOT NULL ORDER BY {col}");
            let mut stmt = conn.prepare(&sql).map_err(|e| Error::Store(e.to_string()))?;
            let values = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| Error::Store(e.to_string()))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::Store(e.to_string()))?;
            Ok(values)
        };

        Ok(Metadata {
            agent_names: distinct("agent_name")?,
            job_types: distinct("job_type")?,
            products: distinct("product")?,
            platforms: distinct("platform")?,
            product_families: distinct("product_family")?,
            websites: distinct("website")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_concurrency::WriterSerializer;
    use telemetry_core::testing::sample_run_input;
    use telemetry_storage::{PragmaConfig, Store};
    use tempfile::tempdir;

    use crate::write::WriteEngine;

    fn setup() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        (dir, path)
    }

    #[test]
    fn get_run_roundtrips_an_insert() {
        let (_dir, path) = setup();
        let cfg = PragmaConfig::default();
        let store = Store::open(&path, &cfg).unwrap();
        let writer = WriterSerializer::new(store);
        let engine = WriteEngine::new(&writer);
        let input = sample_run_input("agent-a");
        let event_id = input.event_id.clone();
        engine.insert(input).unwrap();

        let reader = Store::open_reader(&path, &cfg).unwrap();
        let query = QueryEngine::new(&reader);
        let found = query.get_run(&event_id).unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().event_id, event_id);
    }

    #[test]
    fn list_runs_orders_stably_and_paginates() {
        let (_dir, path) = setup();
        let cfg = PragmaConfig::default();
        let store = Store::open(&path, &cfg).unwrap();
        let writer = WriterSerializer::new(store);
        let engine = WriteEngine::new(&writer);
        for _ in 0..5 {
            engine.insert(sample_run_input("agent-a")).unwrap();
        }

        let reader = Store::open_reader(&path, &cfg).unwrap();
        let query = QueryEngine::new(&reader);
        let page1 = query
            .list_runs(&RunFilter::default(), &Page { limit: 2, cursor: None })
            .unwrap();
        assert_eq!(page1.items.len(), 2);
        assert!(page1.next_cursor.is_some());

        let page2 = query
            .list_runs(
                &RunFilter::default(),
                &Page {
                    limit: 2,
                    cursor: page1.next_cursor.clone(),
                },
            )
            .unwrap();
        assert_eq!(page2.items.len(), 2);
        assert_ne!(page1.items[0].event_id, page2.items[0].event_id);
    }

    #[test]
    fn status_filter_matches_alias() {
        let (_dir, path) = setup();
        let cfg = PragmaConfig::default();
        let store = Store::open(&path, &cfg).unwrap();
        let writer = WriterSerializer::new(store);
        let engine = WriteEngine::new(&writer);
        let mut input = sample_run_input("agent-a");
        input.status = "failed".to_string();
        engine.insert(input).unwrap();

        let reader = Store::open_reader(&path, &cfg).unwrap();
        let query = QueryEngine::new(&reader);
        let filter = RunFilter {
            status: Some("failed".to_string()),
            ..Default::default()
        };
        let result = query.list_runs(&filter, &Page::default()).unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].status, RunStatus::Failure);
    }
}
