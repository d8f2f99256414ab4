//! Typed client configuration (spec §4.F "configuration"), loaded with
//! explicit precedence: explicit arguments > environment > built-in
//! defaults (spec §9 "dynamic keyword-style configuration" redesign
//! flag) — one struct, no hidden globals.

use std::path::PathBuf;
use std::time::Duration;

/// One `Config` value per process, constructed explicitly and passed into
/// a [`crate::Client`] (spec §9 "global process state" redesign flag).
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    /// Read-only local introspection path; the client never writes here.
    pub db_path: Option<PathBuf>,
    pub metrics_base_dir: PathBuf,
    pub buffer_dir: PathBuf,
    pub lock_file_path: Option<PathBuf>,
    pub log_level: String,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub connect_timeout: Duration,
    pub busy_timeout: Duration,
    pub journal_mode: String,
    pub synchronous_level: String,
    /// Panic/err instead of swallow-and-log on a library-internal failure
    /// (spec §4.F "never-crash-the-agent rule... strict mode toggle").
    pub strict_mode: bool,
    /// Master switch; when false, `submit` always buffers without trying
    /// the network (spec §6 "API enabled" env var).
    pub api_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: "http://127.0.0.1:4317".to_string(),
            db_path: None,
            metrics_base_dir: PathBuf::from("."),
            buffer_dir: PathBuf::from("./telemetry-buffer"),
            lock_file_path: None,
            log_level: "info".to_string(),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(200),
            connect_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(30),
            journal_mode: "DELETE".to_string(),
            synchronous_level: "FULL".to_string(),
            strict_mode: false,
            api_enabled: true,
        }
    }
}

impl Config {
    /// Load from environment over the built-in defaults (spec §6's env
    /// var table). Callers may mutate fields afterward for the
    /// "explicit arguments" tier of the precedence rule.
    pub fn from_env() -> Self {
        let mut cfg = Config::default();
        if let Ok(v) = std::env::var("TELEMETRY_API_URL") {
            cfg.api_base_url = v;
        }
        if let Ok(v) = std::env::var("TELEMETRY_API_ENABLED") {
            cfg.api_enabled = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        if let Ok(v) = std::env::var("TELEMETRY_DB_PATH") {
            cfg.db_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("TELEMETRY_METRICS_DIR") {
            cfg.metrics_base_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("TELEMETRY_BUFFER_DIR") {
            cfg.buffer_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("TELEMETRY_LOCK_PATH") {
            cfg.lock_file_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("TELEMETRY_LOG_LEVEL") {
            cfg.log_level = v;
        }
        if let Ok(v) = std::env::var("TELEMETRY_MAX_RETRIES") {
            if let Ok(n) = v.parse() {
                cfg.max_retries = n;
            }
        }
        if let Ok(v) = std::env::var("TELEMETRY_RETRY_BASE_DELAY_SECS") {
            if let Ok(secs) = v.parse::<f64>() {
                cfg.retry_base_delay = Duration::from_secs_f64(secs);
            }
        }
        if let Ok(v) = std::env::var("TELEMETRY_CONNECT_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse::<f64>() {
                cfg.connect_timeout = Duration::from_secs_f64(secs);
            }
        }
        if let Ok(v) = std::env::var("TELEMETRY_BUSY_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                cfg.busy_timeout = Duration::from_millis(ms);
            }
        }
        if let Ok(v) = std::env::var("TELEMETRY_JOURNAL_MODE") {
            cfg.journal_mode = v;
        }
        if let Ok(v) = std::env::var("TELEMETRY_SYNCHRONOUS_LEVEL") {
            cfg.synchronous_level = v;
        }
        if let Ok(v) = std::env::var("TELEMETRY_STRICT_MODE") {
            cfg.strict_mode = v == "1" || v.eq_ignore_ascii_case("true");
        }
        cfg
    }
}
