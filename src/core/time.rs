//! Shared timestamp and event-id helpers.
//!
//! All persisted timestamps are RFC 3339 UTC strings normalized through
//! chrono, so lexicographic order in SQL equals chronological order.

use crate::core::error::LedgerError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Current time as a normalized RFC 3339 UTC string.
pub fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse and normalize a caller-supplied timestamp. Backdated values are
/// legitimate (captures may be recorded after the fact), so the only check
/// performed is that the input parses at all.
pub fn normalize_timestamp(input: &str) -> Result<String, LedgerError> {
    let parsed = DateTime::parse_from_rfc3339(input).map_err(|e| {
        LedgerError::ValidationError(format!("invalid timestamp '{}': {}", input, e))
    })?;
    Ok(parsed
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true))
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Standard command response envelope shape used across CLI surfaces.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_utc(),
        "event_id": new_event_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
