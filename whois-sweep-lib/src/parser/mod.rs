//! Registry reply parsing.
//!
//! Turns raw WHOIS text into a [`WhoisRecord`]. Parsing never fails: a reply
//! in an unknown layout falls through to the generic key/value rules, and
//! anything that cannot be extracted is simply left unset.
//!
//! The steps, in order:
//!
//! 1. Throttling notices short-circuit into [`WhoisRecord::rate_limited`].
//! 2. The first matching [`ReplyFormat`] extracts raw field values.
//! 3. Dates are normalized to UTC where a known format matches.
//! 4. Availability is classified from free-domain phrases, overridden by any
//!    registration evidence in the text.

pub mod formats;

pub use formats::{detect_format, ExtractedFields, ReplyFormat, FORMATS};

use crate::types::{RecordDate, WhoisRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::trace;

/// Phrases registries use when throttling a client.
const RATE_LIMIT_PHRASES: &[&str] = &[
    "rate limit",
    "rate-limit",
    "try again after",
    "please try again later",
    "too many requests",
    "query rate exceeded",
    "quota exceeded",
];

/// Phrases that suggest the domain is not registered.
const AVAILABLE_PHRASES: &[&str] = &[
    "no match for domain",
    "no match",
    "not found",
    "no data found",
    "no entries found",
    "status: free",
    "status: available",
    "domain not found",
    "no information available",
    "not registered",
    "no such domain",
    "no object found",
    "object does not exist",
    "domain name not known",
    "domain is available",
    "domain is free",
    "domain is not registered",
    "this domain name has not been registered",
];

/// Markers that only appear when a registration exists.
const REGISTRATION_MARKERS: &[&str] = &[
    "registrar:",
    "creation date:",
    "expiration date:",
    "name server:",
    "domain status:",
    "registrant:",
    "admin:",
    "tech:",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%d-%b-%Y", "%Y-%b-%d", "%d.%m.%Y", "%Y.%m.%d", "%Y/%m/%d",
];

/// Parse a raw registry reply into a normalized record.
pub fn parse(raw: &str) -> WhoisRecord {
    if is_rate_limited(raw) {
        return WhoisRecord::rate_limited();
    }

    let format = detect_format(raw);
    trace!(format = format.name(), "detected reply format");
    let fields = format.extract(raw);

    WhoisRecord {
        registrar: fields.registrar,
        creation_date: fields.creation_date.as_deref().map(normalize_date),
        expiration_date: fields.expiration_date.as_deref().map(normalize_date),
        status: fields.status,
        name_servers: fields.name_servers,
        is_available: is_available(raw),
        is_rate_limited: false,
        raw_text: raw.to_string(),
    }
}

/// Whether the reply is a throttling notice. Case-insensitive.
pub fn is_rate_limited(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    RATE_LIMIT_PHRASES.iter().any(|p| lower.contains(p))
}

/// Best-effort availability classification.
///
/// True only when a free-domain phrase is present and no registration
/// marker is.
pub fn is_available(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    let sounds_free = AVAILABLE_PHRASES.iter().any(|p| lower.contains(p));
    let registered = REGISTRATION_MARKERS.iter().any(|m| lower.contains(m));
    sounds_free && !registered
}

/// Normalize a registry date string.
///
/// Tries RFC 3339, numeric-offset and offset-less timestamps (taken as UTC),
/// then date-only formats at midnight UTC. A trailing `.` or ` UTC` is
/// ignored. Unparsable input is kept as [`RecordDate::Raw`].
pub fn normalize_date(value: &str) -> RecordDate {
    let trimmed = value.trim();
    let cleaned = trimmed.trim_end_matches('.');
    let cleaned = cleaned.strip_suffix(" UTC").unwrap_or(cleaned).trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(cleaned) {
        return RecordDate::Parsed(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(cleaned, "%Y-%m-%dT%H:%M:%S%z") {
        return RecordDate::Parsed(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(cleaned, fmt) {
            return RecordDate::Parsed(naive.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(cleaned, fmt) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return RecordDate::Parsed(naive.and_utc());
            }
        }
    }

    RecordDate::Raw(trimmed.to_string())
}
