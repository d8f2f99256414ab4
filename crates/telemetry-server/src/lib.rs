//! The long-lived HTTP ingestion server (spec §4.D): request parsing and
//! dispatch to `telemetry-engine`, process lifecycle, and the
//! `WriterGuard`-protected startup sequence.

mod config;
mod dto;
mod error;
mod handlers;
mod lifecycle;
mod state;

pub use config::ServerConfig;
pub use lifecycle::{build_router, run};
pub use state::AppState;
