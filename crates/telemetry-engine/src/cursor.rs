//! Opaque pagination cursors for `list_runs` (spec §4.C: "page tokens are
//! opaque cursors derived from the last row").

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use telemetry_core::{Error, Result};

/// Decoded cursor position: the `(start_time, event_id)` of the last row
/// returned, matching the stable `(start_time DESC, event_id DESC)`
/// ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub start_time: DateTime<Utc>,
    pub event_id: String,
}

impl Cursor {
    pub fn encode(&self) -> String {
        let raw = format!("{}\u{0}{}", self.start_time.to_rfc3339(), self.event_id);
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| Error::validation("cursor", "malformed page token"))?;
        let raw = String::from_utf8(bytes)
            .map_err(|_| Error::validation("cursor", "malformed page token"))?;
        let mut parts = raw.splitn(2, '\u{0}');
        let start_time_raw = parts
            .next()
            .ok_or_else(|| Error::validation("cursor", "malformed page token"))?;
        let event_id = parts
            .next()
            .ok_or_else(|| Error::validation("cursor", "malformed page token"))?
            .to_string();
        let start_time = DateTime::parse_from_rfc3339(start_time_raw)
            .map_err(|_| Error::validation("cursor", "malformed page token"))?
            .with_timezone(&Utc);
        Ok(Cursor { start_time, event_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn round_trips() {
        let c = Cursor {
            start_time: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            event_id: "E1".to_string(),
        };
        let token = c.encode();
        let decoded = Cursor::decode(&token).unwrap();
        assert_eq!(c, decoded);
    }

    #[test]
    fn malformed_token_is_a_validation_error() {
        assert!(Cursor::decode("not-a-cursor!!!").is_err());
    }
}
