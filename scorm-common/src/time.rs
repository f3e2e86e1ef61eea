//! Timestamp utilities
//!
//! The player echoes the package timestamp it was rendered with on every
//! request, so the wire representation must round-trip exactly. All timestamps
//! produced here are truncated to microseconds, the precision of the wire
//! format.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};

use crate::{Error, Result};

/// Wire format: `YYYY-MM-DDTHH:MM:SS.ffffff±HHMM`
pub const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%z";

/// Get current UTC timestamp at microsecond precision
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Format a timestamp for the player wire protocol
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(WIRE_FORMAT).to_string()
}

/// Parse a client supplied timestamp
///
/// Accepts the wire format, RFC 3339, and naive `YYYY-MM-DD[T ]HH:MM:SS[.f]`
/// (read as UTC). An empty or whitespace-only string is treated as absent.
pub fn parse_timestamp(raw: &str) -> Result<Option<DateTime<Utc>>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let normalized = trimmed.replacen(' ', "T", 1);

    if let Ok(dt) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Some(naive.and_utc()));
    }

    Err(Error::InvalidInput(format!("Unrecognized timestamp: {}", raw)))
}

/// Storage representation (RFC 3339, microseconds, `Z` suffix)
pub fn to_storage(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse the storage representation written by [`to_storage`]
pub fn from_storage(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Corrupt stored timestamp {:?}: {}", raw, e)))
}
