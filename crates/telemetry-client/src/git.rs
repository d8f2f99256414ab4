//! Best-effort git/context enrichment (spec §4.F: "A detector runs once
//! per client process (cached; force-refresh available)... Detection is
//! best-effort: any failure leaves the fields unset and never raises").

use std::path::Path;
use std::process::Command;
use std::sync::RwLock;

use once_cell::sync::Lazy;

/// Detected repository context for the current working directory.
#[derive(Debug, Clone, Default)]
pub struct GitContext {
    pub git_repo: Option<String>,
    pub git_branch: Option<String>,
    pub git_run_tag: Option<String>,
}

static CACHE: Lazy<RwLock<Option<GitContext>>> = Lazy::new(|| RwLock::new(None));

/// Returns the cached detection result, running detection once per
/// process on first call.
pub fn detect() -> GitContext {
    if let Some(cached) = CACHE.read().unwrap().clone() {
        return cached;
    }
    let detected = detect_uncached();
    *CACHE.write().unwrap() = Some(detected.clone());
    detected
}

/// Re-runs detection, overwriting the cache (spec §4.F "force-refresh
/// available").
pub fn refresh() -> GitContext {
    let detected = detect_uncached();
    *CACHE.write().unwrap() = Some(detected.clone());
    detected
}

fn detect_uncached() -> GitContext {
    let cwd = match std::env::current_dir() {
        Ok(p) => p,
        Err(_) => return GitContext::default(),
    };

    GitContext {
        git_repo: run_git(&cwd, &["config", "--get", "remote.origin.url"]),
        git_branch: run_git(&cwd, &["rev-parse", "--abbrev-ref", "HEAD"]),
        git_run_tag: std::env::var("TELEMETRY_RUN_TAG").ok(),
    }
}

fn run_git(cwd: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git").current_dir(cwd).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
