//! Canonical run status and its alias table (spec §3, §6, GLOSSARY).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the six canonical run statuses. Always what is stored on disk
/// (Invariant I3); aliases are normalized away before a row is ever written
/// or a query is ever issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failure,
    Partial,
    Timeout,
    Cancelled,
}

impl RunStatus {
    /// Canonical lowercase wire/storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
            RunStatus::Partial => "partial",
            RunStatus::Timeout => "timeout",
            RunStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a status value, normalizing known aliases:
    /// `failed -> failure`, `completed|succeeded -> success`,
    /// `canceled -> cancelled`. Unknown values are a validation error at the
    /// call site, not here — this just does the lookup.
    pub fn parse_normalized(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_ascii_lowercase();
        match lower.as_str() {
            "running" => Some(RunStatus::Running),
            "success" | "completed" | "succeeded" => Some(RunStatus::Success),
            "failure" | "failed" => Some(RunStatus::Failure),
            "partial" => Some(RunStatus::Partial),
            "timeout" => Some(RunStatus::Timeout),
            "cancelled" | "canceled" => Some(RunStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunStatus::parse_normalized(s).ok_or_else(|| format!("unknown status alias: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_normalize_to_canonical() {
        assert_eq!(RunStatus::parse_normalized("failed"), Some(RunStatus::Failure));
        assert_eq!(RunStatus::parse_normalized("completed"), Some(RunStatus::Success));
        assert_eq!(RunStatus::parse_normalized("succeeded"), Some(RunStatus::Success));
        assert_eq!(RunStatus::parse_normalized("canceled"), Some(RunStatus::Cancelled));
        assert_eq!(RunStatus::parse_normalized("CANCELLED"), Some(RunStatus::Cancelled));
    }

    #[test]
    fn unknown_alias_rejected() {
        assert_eq!(RunStatus::parse_normalized("bogus"), None);
    }

    #[test]
    fn canonical_round_trips() {
        for s in [
            RunStatus::Running,
            RunStatus::Success,
            RunStatus::Failure,
            RunStatus::Partial,
            RunStatus::Timeout,
            RunStatus::Cancelled,
        ] {
            assert_eq!(RunStatus::parse_normalized(s.as_str()), Some(s));
        }
    }
}
