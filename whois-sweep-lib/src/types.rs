//! Core data types for domain resolution.
//!
//! This module defines the normalized record every registry reply and
//! provider payload is reduced to, the per-domain outcome handed back to
//! callers, and the configuration that drives the resolver and scheduler.

use crate::error::ResolveError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// A registration date as reported by a registry.
///
/// Registries disagree wildly on date formats. Dates that match a known
/// format are normalized to UTC; anything else is kept verbatim so no
/// information is lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordDate {
    /// Normalized UTC timestamp
    Parsed(DateTime<Utc>),
    /// Original string that matched no known format
    Raw(String),
}

impl RecordDate {
    /// The normalized timestamp, if the date could be parsed.
    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            RecordDate::Parsed(dt) => Some(dt),
            RecordDate::Raw(_) => None,
        }
    }
}

impl fmt::Display for RecordDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordDate::Parsed(dt) => write!(f, "{}", dt.format("%Y-%m-%d")),
            RecordDate::Raw(raw) => write!(f, "{}", raw),
        }
    }
}

/// Normalized registration record.
///
/// Produced by the format parser from raw registry text, or by a fallback
/// provider from its JSON payload. Once built it is never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoisRecord {
    /// Registrar holding the registration
    pub registrar: Option<String>,

    /// When the domain was first registered
    pub creation_date: Option<RecordDate>,

    /// When the registration expires
    pub expiration_date: Option<RecordDate>,

    /// First status token reported by the registry (e.g. "active")
    pub status: Option<String>,

    /// Lowercased, deduplicated name servers in first-seen order
    pub name_servers: Vec<String>,

    /// Best-effort availability classification
    pub is_available: bool,

    /// The reply was a throttling notice; every other field is unset
    pub is_rate_limited: bool,

    /// Original reply text (or pretty-printed provider payload)
    #[serde(rename = "rawData")]
    pub raw_text: String,
}

impl WhoisRecord {
    /// Record for a throttling reply.
    ///
    /// Everything except the flag is left empty, including the raw text.
    pub fn rate_limited() -> Self {
        Self {
            is_rate_limited: true,
            ..Self::default()
        }
    }
}

/// A domain name prepared for routing.
///
/// Holds the lowercased name together with the two keys tried against the
/// registry map: the compound two-label suffix and the last label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainQuery {
    /// Lowercased domain name without surrounding whitespace or trailing dot
    pub domain: String,

    /// Last label (e.g. "uk" for "example.co.uk")
    pub suffix: String,

    /// Last two labels (e.g. "co.uk"), absent for single-dot names
    pub compound_suffix: Option<String>,
}

impl DomainQuery {
    /// Normalize and validate a domain name.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::InvalidDomain` if the input is empty, has no
    /// dot, or contains an invalid label.
    pub fn parse(input: &str) -> Result<Self, ResolveError> {
        let domain = crate::utils::normalize_domain(input);
        crate::utils::validate_domain(&domain)?;

        let labels: Vec<&str> = domain.split('.').collect();
        let suffix = labels[labels.len() - 1].to_string();
        let compound_suffix = if labels.len() >= 3 {
            Some(format!(
                "{}.{}",
                labels[labels.len() - 2],
                labels[labels.len() - 1]
            ))
        } else {
            None
        };

        Ok(Self {
            domain,
            suffix,
            compound_suffix,
        })
    }
}

/// Result of resolving one domain.
///
/// Exactly one of `record` and `error` is set, matching `success`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionOutcome {
    /// The domain as submitted (normalized when it could be)
    pub domain: String,

    /// Whether a record was obtained
    pub success: bool,

    /// The record, on success
    #[serde(rename = "data", skip_serializing_if = "Option::is_none")]
    pub record: Option<WhoisRecord>,

    /// The failure, serialized as its message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResolveError>,

    /// Stable tag of `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,

    /// Registry server or provider name that produced the outcome
    pub server: String,
}

impl ResolutionOutcome {
    /// Build a successful outcome.
    pub fn success<D: Into<String>, S: Into<String>>(
        domain: D,
        record: WhoisRecord,
        server: S,
    ) -> Self {
        Self {
            domain: domain.into(),
            success: true,
            record: Some(record),
            error: None,
            error_kind: None,
            server: server.into(),
        }
    }

    /// Build a failed outcome.
    pub fn failure<D: Into<String>, S: Into<String>>(
        domain: D,
        error: ResolveError,
        server: S,
    ) -> Self {
        Self {
            domain: domain.into(),
            success: false,
            record: None,
            error_kind: Some(error.kind()),
            error: Some(error),
            server: server.into(),
        }
    }
}

/// Configuration for resolution and batch operations.
///
/// Durations are skipped by serde; the config file layer parses them from
/// human-readable strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Timeout for each registry session
    /// Default: 30 seconds
    #[serde(skip)]
    pub timeout: Duration,

    /// Retries after a connection failure or timeout
    /// Default: 3, Range: 0-10
    pub max_retries: u32,

    /// Wait between connection retries
    /// Default: 3 seconds
    #[serde(skip)]
    pub retry_delay: Duration,

    /// Referral hops followed after the first server
    /// Default: 3, Range: 0-10
    pub max_referral_hops: u32,

    /// Pause between batch chunks
    /// Default: 5 seconds
    #[serde(skip)]
    pub chunk_delay: Duration,

    /// Wait before a provider retries a throttled request
    /// Default: 30 seconds
    #[serde(skip)]
    pub throttle_delay: Duration,

    /// Whether throttled registry replies escalate to fallback providers
    /// Default: true
    pub enable_fallback: bool,

    /// Provider names tried in order on throttling
    /// Default: ["jsonwhoisapi", "whoisfreaks"]
    pub provider_order: Vec<String>,

    /// Suffix to server entries layered over the built-in table
    /// Default: empty
    pub server_overrides: HashMap<String, String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(3),
            max_referral_hops: 3,
            chunk_delay: Duration::from_secs(5),
            throttle_delay: Duration::from_secs(30),
            enable_fallback: true,
            provider_order: vec!["jsonwhoisapi".to_string(), "whoisfreaks".to_string()],
            server_overrides: HashMap::new(),
        }
    }
}

impl ResolveConfig {
    /// Set the registry session timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry bound. Capped at 10.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.min(10);
        self
    }

    /// Set the wait between connection retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the referral hop limit. Capped at 10.
    pub fn with_max_referral_hops(mut self, hops: u32) -> Self {
        self.max_referral_hops = hops.min(10);
        self
    }

    /// Set the pause between batch chunks.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Set the provider throttle backoff.
    pub fn with_throttle_delay(mut self, delay: Duration) -> Self {
        self.throttle_delay = delay;
        self
    }

    /// Enable or disable provider escalation.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.enable_fallback = enabled;
        self
    }

    /// Set the provider escalation order.
    pub fn with_provider_order(mut self, order: Vec<String>) -> Self {
        self.provider_order = order;
        self
    }

    /// Add or replace a registry server entry.
    pub fn with_server<S: Into<String>, H: Into<String>>(mut self, suffix: S, host: H) -> Self {
        self.server_overrides
            .insert(suffix.into().to_lowercase(), host.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_domain_query_derives_routing_keys() {
        let q = DomainQuery::parse("  Example.CO.UK. ").unwrap();
        assert_eq!(q.domain, "example.co.uk");
        assert_eq!(q.suffix, "uk");
        assert_eq!(q.compound_suffix.as_deref(), Some("co.uk"));

        let q = DomainQuery::parse("example.com").unwrap();
        assert_eq!(q.suffix, "com");
        assert_eq!(q.compound_suffix, None);
    }

    #[test]
    fn test_domain_query_rejects_garbage() {
        assert!(DomainQuery::parse("").is_err());
        assert!(DomainQuery::parse("localhost").is_err());
        assert!(DomainQuery::parse("bad_label.com").is_err());
    }

    #[test]
    fn test_rate_limited_record_is_empty() {
        let record = WhoisRecord::rate_limited();
        assert!(record.is_rate_limited);
        assert!(!record.is_available);
        assert!(record.registrar.is_none());
        assert!(record.name_servers.is_empty());
        assert!(record.raw_text.is_empty());
    }

    #[test]
    fn test_outcome_json_shape() {
        let record = WhoisRecord {
            registrar: Some("Example Corp".to_string()),
            creation_date: Some(RecordDate::Parsed(
                Utc.with_ymd_and_hms(1995, 8, 14, 4, 0, 0).unwrap(),
            )),
            status: Some("active".to_string()),
            raw_text: "Domain Name: EXAMPLE.COM".to_string(),
            ..WhoisRecord::default()
        };
        let outcome = ResolutionOutcome::success("example.com", record, "whois.verisign-grs.com");
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["registrar"], "Example Corp");
        assert_eq!(json["data"]["creationDate"], "1995-08-14T04:00:00Z");
        assert_eq!(json["data"]["expirationDate"], serde_json::Value::Null);
        assert_eq!(json["data"]["isAvailable"], false);
        assert_eq!(json["data"]["rawData"], "Domain Name: EXAMPLE.COM");
        assert!(json.get("error").is_none());
        assert_eq!(json["server"], "whois.verisign-grs.com");
    }

    #[test]
    fn test_failure_outcome_json_shape() {
        let outcome = ResolutionOutcome::failure(
            "example.zzzz",
            ResolveError::unsupported_suffix("example.zzzz", "zzzz"),
            "unknown",
        );
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
        assert_eq!(json["errorKind"], "unsupported_suffix");
        assert_eq!(json["server"], "unknown");
    }

    #[test]
    fn test_config_builders_clamp() {
        let config = ResolveConfig::default()
            .with_max_retries(50)
            .with_max_referral_hops(99)
            .with_server("CO.UK", "whois.nic.uk");
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.max_referral_hops, 10);
        assert_eq!(config.server_overrides["co.uk"], "whois.nic.uk");
    }
}
