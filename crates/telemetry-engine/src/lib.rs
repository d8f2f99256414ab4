//! Write and read engines over a [`telemetry_storage::Store`] (spec §4.B,
//! §4.C): idempotent inserts, PATCH merges, ordered batch writes with
//! bounded retry, and parameterized queries with opaque-cursor pagination.

mod cursor;
mod query;
mod retry;
mod write;

pub use cursor::Cursor;
pub use query::{AggregateGroup, Grouping, ListRunsResult, Metadata, Page, QueryEngine, RunFilter};
pub use retry::{with_retry, RetryConfig};
pub use write::{
    BatchRecordOutcome, BatchResult, InsertOutcome, PatchOutcome, WriteEngine,
    DEFAULT_BATCH_TRANSACTION_SIZE,
};
