//! ureq-based HTTP calls with bounded retry (spec §4.F failover: "try the
//! HTTP call with bounded retries (exponential backoff with jitter)"),
//! grounded on the teacher's own `ureq` usage pattern in
//! `intelligence::llm_client`.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::config::Config;

/// Outcome of one attempted POST against the ingest server (spec §6
/// response shapes for `/api/v1/runs`).
#[derive(Debug)]
pub enum HttpOutcome<T> {
    Ok(T),
    /// Non-2xx response the server sent deliberately (validation, 404):
    /// never retried, never buffered — the caller decides what to do.
    Rejected { status: u16, body: String },
    /// Network failure or 5xx/503 after retries are exhausted: the
    /// caller falls through to the failover buffer.
    Unreachable(String),
}

pub struct HttpClient {
    agent: ureq::Agent,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpClient {
    pub fn new(cfg: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(cfg.connect_timeout)
            .timeout(cfg.connect_timeout.saturating_mul(4))
            .build();
        HttpClient {
            agent,
            base_url: cfg.api_base_url.trim_end_matches('/').to_string(),
            max_retries: cfg.max_retries,
            base_delay: cfg.retry_base_delay,
        }
    }

    pub fn post_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> HttpOutcome<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;
        loop {
            match self.agent.post(&url).send_json(body) {
                Ok(resp) => {
                    let status = resp.status();
                    return match resp.into_json::<T>() {
                        Ok(parsed) => HttpOutcome::Ok(parsed),
                        Err(e) => HttpOutcome::Unreachable(format!("bad response body: {e}")),
                    };
                }
                Err(ureq::Error::Status(status, resp)) => {
                    let body_text = resp.into_string().unwrap_or_default();
                    if status == 503 && attempt < self.max_retries {
                        self.backoff(attempt);
                        attempt += 1;
                        continue;
                    }
                    if status >= 500 {
                        return HttpOutcome::Unreachable(format!("{status}: {body_text}"));
                    }
                    return HttpOutcome::Rejected {
                        status,
                        body: body_text,
                    };
                }
                Err(e @ ureq::Error::Transport(_)) => {
                    if attempt < self.max_retries {
                        self.backoff(attempt);
                        attempt += 1;
                        continue;
                    }
                    return HttpOutcome::Unreachable(e.to_string());
                }
            }
        }
    }

    pub fn patch_json<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> HttpOutcome<T> {
        let url = format!("{}{}", self.base_url, path);
        match self.agent.request("PATCH", &url).send_json(body) {
            Ok(resp) => match resp.into_json::<T>() {
                Ok(parsed) => HttpOutcome::Ok(parsed),
                Err(e) => HttpOutcome::Unreachable(format!("bad response body: {e}")),
            },
            Err(ureq::Error::Status(status, resp)) => HttpOutcome::Rejected {
                status,
                body: resp.into_string().unwrap_or_default(),
            },
            Err(e) => HttpOutcome::Unreachable(e.to_string()),
        }
    }

    fn backoff(&self, attempt: u32) {
        let exp = self.base_delay * 2u32.saturating_pow(attempt);
        let jitter_ms = (rough_jitter(attempt) % 50) as u64;
        std::thread::sleep(exp + Duration::from_millis(jitter_ms));
    }
}

/// Deterministic, allocation-free stand-in for jitter. Not
/// cryptographically random; the point is to desynchronize retries
/// across concurrently-failing clients, not to be unpredictable.
fn rough_jitter(seed: u32) -> u32 {
    seed.wrapping_mul(2654435761).rotate_left(13)
}
