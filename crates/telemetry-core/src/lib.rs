//! Shared types for the telemetry ingestion service.
//!
//! This crate defines the wire- and storage-level shape of a [`Run`] and its
//! [`RunEvent`]s, the canonical [`RunStatus`] enum and its alias table, and
//! the [`Error`] type shared by the storage, engine, server, and client
//! crates. Nothing here touches SQLite, HTTP, or the filesystem — those
//! concerns live in `telemetry-storage`, `telemetry-server`, and
//! `telemetry-client` respectively.

mod canonicalize;
mod error;
pub mod limits;
mod run;
mod status;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use canonicalize::{canonicalize_insert, canonicalize_patch, PatchField};
pub use error::{Error, Result};
pub use run::{
    GitCommitSource, Run, RunEvent, RunInput, RunPatch, SchemaMigration, CURRENT_SCHEMA_VERSION,
};
pub use status::RunStatus;
