//! Bounded retry with exponential backoff for transient `busy`/`locked`
//! errors (spec §4.B "Transaction discipline", §5 "bounded max-retries,
//! exponential base-delay").

use std::thread;
use std::time::Duration;

use telemetry_core::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_millis(50),
        }
    }
}

/// Run `f`, retrying with exponential backoff while it reports a
/// retryable (`busy`/`locked`) error. Validation errors are never retried
/// (spec §7: "Validation ... Do not retry"); once retries are exhausted
/// the last error is returned unchanged.
pub fn with_retry<T>(cfg: &RetryConfig, mut f: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 0u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < cfg.max_retries => {
                let backoff = cfg.base_delay * 2u32.saturating_pow(attempt);
                thread::sleep(backoff);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retries_until_success() {
        let calls = Cell::new(0);
        let cfg = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
        };
        let result = with_retry(&cfg, || {
            let n = calls.get() + 1;
            calls.set(n);
            if n < 3 {
                Err(Error::Busy)
            } else {
                Ok(n)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let cfg = RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
        };
        let result: Result<()> = with_retry(&cfg, || Err(Error::Busy));
        assert!(matches!(result, Err(Error::Busy)));
    }

    #[test]
    fn validation_errors_are_never_retried() {
        let calls = Cell::new(0);
        let cfg = RetryConfig::default();
        let result: Result<()> = with_retry(&cfg, || {
            calls.set(calls.get() + 1);
            Err(Error::validation("field", "bad"))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
