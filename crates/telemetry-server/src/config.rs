//! Typed server configuration (spec §9 "dynamic keyword-style
//! configuration" redesign flag): one struct, loaded once, passed
//! explicitly — no hidden globals.

use std::path::PathBuf;
use std::time::Duration;

use telemetry_storage::PragmaConfig;

/// Configuration for one [`crate::IngestServer`] process (spec §4.D, §6
/// env var table).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Loopback by default (spec §4.D "bound to loopback by default").
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub lock_path: PathBuf,
    pub pragma: PragmaConfig,
    /// Whether to run pending migrations automatically at startup
    /// (spec §4.D "optionally auto-migrate").
    pub auto_migrate: bool,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Bounded grace period for in-flight requests during shutdown
    /// (spec §4.D lifecycle).
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "127.0.0.1:4317".to_string(),
            db_path: PathBuf::from("telemetry.db"),
            lock_path: PathBuf::from("telemetry.lock"),
            pragma: PragmaConfig::default(),
            auto_migrate: true,
            max_retries: 5,
            retry_base_delay: Duration::from_millis(50),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Load from environment, explicit precedence: env var if present,
    /// built-in default otherwise (spec §4.F config precedence applies
    /// equally to the server's own config; §6 names these variables).
    pub fn from_env() -> Self {
        let mut cfg = ServerConfig::default();
        if let Ok(v) = std::env::var("TELEMETRY_BIND_ADDR") {
            cfg.bind_addr = v;
        }
        if let Ok(v) = std::env::var("TELEMETRY_DB_PATH") {
            cfg.db_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("TELEMETRY_LOCK_PATH") {
            cfg.lock_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("TELEMETRY_AUTO_MIGRATE") {
            cfg.auto_migrate = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        if let Ok(v) = std::env::var("TELEMETRY_MAX_RETRIES") {
            if let Ok(n) = v.parse() {
                cfg.max_retries = n;
            }
        }
        if let Ok(v) = std::env::var("TELEMETRY_RETRY_BASE_DELAY_MS") {
            if let Ok(ms) = v.parse() {
                cfg.retry_base_delay = Duration::from_millis(ms);
            }
        }
        if let Ok(v) = std::env::var("TELEMETRY_BUSY_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                cfg.pragma.busy_timeout_ms = ms;
            }
        }
        cfg
    }
}
