use std::path::PathBuf;
use std::sync::Arc;

use telemetry_concurrency::WriterSerializer;
use telemetry_engine::{RetryConfig, DEFAULT_BATCH_TRANSACTION_SIZE};
use telemetry_storage::PragmaConfig;

use crate::config::ServerConfig;

/// Shared server state handed to every handler via axum's `State`
/// extractor (spec §5 "many concurrent HTTP requests handled on
/// independent worker tasks").
#[derive(Clone)]
pub struct AppState(pub Arc<Inner>);

pub struct Inner {
    pub writer: WriterSerializer,
    pub db_path: PathBuf,
    pub pragma: PragmaConfig,
    pub retry: RetryConfig,
    pub batch_transaction_size: usize,
}

impl AppState {
    pub fn new(writer: WriterSerializer, cfg: &ServerConfig) -> Self {
        AppState(Arc::new(Inner {
            writer,
            db_path: cfg.db_path.clone(),
            pragma: cfg.pragma,
            retry: RetryConfig {
                max_retries: cfg.max_retries,
                base_delay: cfg.retry_base_delay,
            },
            batch_transaction_size: DEFAULT_BATCH_TRANSACTION_SIZE,
        }))
    }
}
