//! Fallback data providers.
//!
//! When a registry throttles us, the resolver escalates to structured-data
//! services that answer over HTTPS with JSON. Each service implements
//! [`FallbackProvider`] and reduces its payload to the same [`WhoisRecord`]
//! the text parser produces.
//!
//! Shared plumbing lives here: the throttle retry loop, the HTTP send
//! helper, and tolerant JSON field readers.

mod api_ninjas;
mod jsonwhois;
mod whoisfreaks;

pub use api_ninjas::ApiNinjasProvider;
pub use jsonwhois::JsonWhoisProvider;
pub use whoisfreaks::WhoisFreaksProvider;

use crate::error::ResolveError;
use crate::parser::normalize_date;
use crate::types::{RecordDate, WhoisRecord};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::RequestBuilder;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Provider names accepted in configuration, in default preference order.
pub const KNOWN_PROVIDERS: &[&str] = &["jsonwhoisapi", "whoisfreaks", "apininjas"];

/// A structured-data service that can stand in for a registry.
#[async_trait]
pub trait FallbackProvider: Send + Sync {
    /// Stable provider name, used in outcomes and configuration.
    fn name(&self) -> &str;

    /// Look up a domain and normalize the answer.
    ///
    /// # Errors
    ///
    /// `ResolveError::RateLimited` once the provider's own throttle retry is
    /// spent, `ResolveError::Provider` for anything else.
    async fn query(&self, domain: &str) -> Result<WhoisRecord, ResolveError>;
}

/// Retry policy for provider-side throttling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Extra attempts after the first throttled one
    pub retries: u32,
    /// Wait before each extra attempt
    pub delay: Duration,
}

impl Backoff {
    /// One retry after `delay`.
    pub fn new(delay: Duration) -> Self {
        Self { retries: 1, delay }
    }

    /// Never retry.
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Run `attempt` until it stops reporting throttling or the backoff is spent.
///
/// Only `RateLimited` errors are retried; every other result is returned
/// as-is.
pub async fn with_throttle_retry<F, Fut>(
    provider: &str,
    backoff: Backoff,
    mut attempt: F,
) -> Result<WhoisRecord, ResolveError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<WhoisRecord, ResolveError>>,
{
    let mut attempts_made = 0u32;
    loop {
        match attempt().await {
            Err(e) if e.is_rate_limited() && attempts_made < backoff.retries => {
                attempts_made += 1;
                warn!(
                    provider,
                    attempt = attempts_made,
                    delay_ms = backoff.delay.as_millis() as u64,
                    "provider throttled, backing off"
                );
                tokio::time::sleep(backoff.delay).await;
            }
            result => return result,
        }
    }
}

/// Send a prepared request and decode the JSON body.
///
/// HTTP 429 becomes `RateLimited` (with `Retry-After` when given); any other
/// non-success status, transport failure or undecodable body becomes a
/// `Provider` error.
pub(crate) async fn send_json(
    request: RequestBuilder,
    provider: &str,
) -> Result<Value, ResolveError> {
    let response = request
        .send()
        .await
        .map_err(|e| ResolveError::provider(provider, format!("request failed: {}", e)))?;

    let status = response.status().as_u16();
    debug!(provider, status, "provider response");

    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(ResolveError::RateLimited {
            service: provider.to_string(),
            message: "HTTP 429 Too Many Requests".to_string(),
            retry_after,
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| ResolveError::provider(provider, format!("failed to read body: {}", e)))?;

    if !(200..300).contains(&status) {
        return Err(ResolveError::provider_with_status(
            provider,
            truncate(&body, 200),
            status,
        ));
    }

    serde_json::from_str(&body).map_err(|e| {
        warn!(provider, error = %e, "provider returned invalid JSON");
        ResolveError::provider(provider, format!("invalid JSON: {}", e))
    })
}

/// Build the escalation chain from provider names.
///
/// Credentials are read from the environment by each provider; a provider
/// without credentials stays in the chain and fails with a `Provider` error
/// when called.
///
/// # Errors
///
/// `ResolveError::Config` for an unknown provider name, or if the HTTP
/// client cannot be built.
pub fn build_chain(
    order: &[String],
    backoff: Backoff,
) -> Result<Vec<Arc<dyn FallbackProvider>>, ResolveError> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("whois-sweep/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ResolveError::config(format!("cannot build HTTP client: {}", e)))?;

    order
        .iter()
        .map(|name| build_provider(name, http.clone(), backoff))
        .collect()
}

fn build_provider(
    name: &str,
    http: reqwest::Client,
    backoff: Backoff,
) -> Result<Arc<dyn FallbackProvider>, ResolveError> {
    let provider: Arc<dyn FallbackProvider> = match name.trim().to_lowercase().as_str() {
        "jsonwhoisapi" => Arc::new(JsonWhoisProvider::from_env(http, backoff)),
        "whoisfreaks" => Arc::new(WhoisFreaksProvider::from_env(http, backoff)),
        "apininjas" => Arc::new(ApiNinjasProvider::from_env(http, backoff)),
        other => {
            return Err(ResolveError::config(format!(
                "Unknown provider '{}'. Known providers: {}",
                other,
                KNOWN_PROVIDERS.join(", ")
            )))
        }
    };
    Ok(provider)
}

fn truncate(text: &str, max: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// Tolerant JSON readers. Providers disagree on field names and types, so
// each reader takes a list of candidate keys and accepts several shapes.

/// First non-empty string at any of `keys` (dotted paths allowed).
pub(crate) fn json_str(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        lookup(value, key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Registration flag: booleans or "yes"/"no"/"true"/"false" strings.
pub(crate) fn json_flag(value: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|key| match lookup(value, key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "yes" | "true" | "registered" => Some(true),
            "no" | "false" | "available" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// A date given as a string, a unix timestamp, or an array of either.
pub(crate) fn json_date(value: &Value, keys: &[&str]) -> Option<RecordDate> {
    keys.iter().find_map(|key| date_from(lookup(value, key)?))
}

fn date_from(value: &Value) -> Option<RecordDate> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(normalize_date(s)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .map(RecordDate::Parsed),
        Value::Array(items) => items.iter().find_map(date_from),
        _ => None,
    }
}

/// Status as a string, or an array of strings joined with ", ".
pub(crate) fn json_status(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match lookup(value, key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    })
}

/// Host names from an array of strings or of objects with `hostname`/`name`.
pub(crate) fn json_hostnames(value: &Value, keys: &[&str]) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();
    for key in keys {
        let items = match lookup(value, key).and_then(Value::as_array) {
            Some(items) => items,
            None => continue,
        };
        for item in items {
            let host = match item {
                Value::String(s) => Some(s.as_str()),
                Value::Object(_) => item
                    .get("hostname")
                    .or_else(|| item.get("name"))
                    .and_then(Value::as_str),
                _ => None,
            };
            if let Some(host) = host {
                let host = host.trim().trim_end_matches('.').to_lowercase();
                if !host.is_empty() && !hosts.contains(&host) {
                    hosts.push(host);
                }
            }
        }
        if !hosts.is_empty() {
            break;
        }
    }
    hosts
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, key| current.get(key))
        .filter(|v| !v.is_null())
}

/// Assemble a record from mapped fields.
///
/// When the payload has no explicit registration flag, the domain counts as
/// registered if a registrar or creation date is present.
pub(crate) fn record_from_payload(
    payload: &Value,
    registered: Option<bool>,
    registrar: Option<String>,
    creation_date: Option<RecordDate>,
    expiration_date: Option<RecordDate>,
    status: Option<String>,
    name_servers: Vec<String>,
) -> WhoisRecord {
    let registered =
        registered.unwrap_or(registrar.is_some() || creation_date.is_some());
    WhoisRecord {
        registrar,
        creation_date,
        expiration_date,
        status,
        name_servers,
        is_available: !registered,
        is_rate_limited: false,
        raw_text: serde_json::to_string_pretty(payload).unwrap_or_default(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_throttle_retry_once_then_surface() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = with_throttle_retry("fake", Backoff::new(Duration::from_secs(30)), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ResolveError::rate_limited("fake", "429")) }
        })
        .await;

        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_throttle_retry_recovers() {
        let calls = AtomicU32::new(0);
        let result = with_throttle_retry("fake", Backoff::new(Duration::ZERO), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ResolveError::rate_limited("fake", "429"))
                } else {
                    Ok(WhoisRecord::default())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let calls = AtomicU32::new(0);
        let result = with_throttle_retry("fake", Backoff::new(Duration::ZERO), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ResolveError::provider("fake", "401")) }
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), "provider");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_json_maps_429() {
        let (base, server) =
            test_support::serve_once("429 Too Many Requests", &[("Retry-After", "7")], "").await;

        let err = send_json(reqwest::Client::new().get(&base), "fake")
            .await
            .unwrap_err();
        server.await.unwrap();

        match err {
            ResolveError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_json_maps_http_errors() {
        let (base, server) = test_support::serve_once("401 Unauthorized", &[], "bad key").await;

        let err = send_json(reqwest::Client::new().get(&base), "fake")
            .await
            .unwrap_err();
        server.await.unwrap();

        assert_eq!(err, ResolveError::provider_with_status("fake", "bad key", 401));
    }

    #[test]
    fn test_json_readers() {
        let payload = json!({
            "registrar": { "name": "Example Corp" },
            "created": [1_000_000_000, "ignored"],
            "status": ["clientTransferProhibited", "serverHold"],
            "registered": "yes",
            "nameservers": [{ "hostname": "NS1.EXAMPLE.COM." }, { "name": "ns2.example.com" }, "ns1.example.com"]
        });

        assert_eq!(
            json_str(&payload, &["registrar_name", "registrar.name"]).as_deref(),
            Some("Example Corp")
        );
        assert_eq!(
            json_date(&payload, &["created"]),
            Some(RecordDate::Parsed(Utc.timestamp_opt(1_000_000_000, 0).unwrap()))
        );
        assert_eq!(
            json_status(&payload, &["status"]).as_deref(),
            Some("clientTransferProhibited, serverHold")
        );
        assert_eq!(json_flag(&payload, &["registered"]), Some(true));
        assert_eq!(
            json_hostnames(&payload, &["nameservers"]),
            vec!["ns1.example.com", "ns2.example.com"]
        );
    }

    #[test]
    fn test_build_chain_rejects_unknown() {
        match build_chain(&["whoisxml".to_string()], Backoff::none()) {
            Err(e) => assert_eq!(e.kind(), "config"),
            Ok(_) => panic!("unknown provider accepted"),
        }

        let chain = build_chain(
            &["jsonwhoisapi".to_string(), "ApiNinjas".to_string()],
            Backoff::none(),
        )
        .unwrap();
        let names: Vec<&str> = chain.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["jsonwhoisapi", "apininjas"]);
    }
}
