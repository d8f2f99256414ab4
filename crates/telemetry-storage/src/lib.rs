//! The embedded relational store (spec §4.A): schema, migrations,
//! pragmas, integrity checks, and hot backup, built on `rusqlite`
//! (bundled SQLite).

mod pragma;
mod row;
mod schema;
mod store;

pub use pragma::{JournalMode, PragmaConfig, PragmaObservation, SynchronousLevel};
pub use row::{run_event_from_row, run_from_row, RUN_COLUMNS};
pub use schema::{verify_schema_or_err, SchemaVerification};
pub use store::{IntegrityDepth, IntegrityReport, Store};
