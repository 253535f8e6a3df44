//! Per-domain resolution.
//!
//! This module provides the `Resolver`, which drives a single domain through
//! routing, the WHOIS query with bounded retries, parsing, and escalation to
//! fallback providers when the registry throttles us.

use crate::error::ResolveError;
use crate::parser;
use crate::protocols::{RegistryMap, WhoisClient};
use crate::providers::{build_chain, Backoff, FallbackProvider};
use crate::types::{DomainQuery, ResolutionOutcome, ResolveConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Server name reported when no registry could be chosen.
pub const UNKNOWN_SERVER: &str = "unknown";

/// Resolves domains one at a time.
///
/// Every call returns a [`ResolutionOutcome`]; failures are values, so a bad
/// domain never aborts a batch. The resolver is immutable and can be shared
/// across tasks behind an `Arc`.
///
/// # Example
///
/// ```rust,no_run
/// use whois_sweep_lib::Resolver;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let resolver = Resolver::new()?;
///     let outcome = resolver.resolve("example.com").await;
///     println!("{} -> success: {}", outcome.domain, outcome.success);
///     Ok(())
/// }
/// ```
pub struct Resolver {
    config: ResolveConfig,
    registry: Arc<RegistryMap>,
    client: WhoisClient,
    providers: Vec<Arc<dyn FallbackProvider>>,
}

impl Resolver {
    /// Create a resolver with default configuration.
    ///
    /// Provider credentials are read from the environment.
    pub fn new() -> Result<Self, ResolveError> {
        Self::with_config(ResolveConfig::default())
    }

    /// Create a resolver from configuration.
    ///
    /// Builds the registry map with the configured overrides, a TCP WHOIS
    /// client, and (unless fallback is disabled) the provider chain.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Config` for unknown provider names.
    pub fn with_config(config: ResolveConfig) -> Result<Self, ResolveError> {
        let providers = if config.enable_fallback {
            build_chain(&config.provider_order, Backoff::new(config.throttle_delay))?
        } else {
            Vec::new()
        };
        let client = WhoisClient::new()
            .with_timeout(config.timeout)
            .with_max_referral_hops(config.max_referral_hops);

        Ok(Self::from_parts(config, client, providers))
    }

    /// Assemble a resolver from prepared parts.
    ///
    /// The client is used as given; its timeout and hop limit are not taken
    /// from `config`.
    pub fn from_parts(
        config: ResolveConfig,
        client: WhoisClient,
        providers: Vec<Arc<dyn FallbackProvider>>,
    ) -> Self {
        let registry = Arc::new(RegistryMap::with_overrides(&config.server_overrides));
        Self {
            config,
            registry,
            client,
            providers,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &ResolveConfig {
        &self.config
    }

    /// The registry map used for routing.
    pub fn registry(&self) -> &RegistryMap {
        &self.registry
    }

    /// Names of the fallback providers, in escalation order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Resolve a domain using the configured retry bound.
    pub async fn resolve(&self, domain: &str) -> ResolutionOutcome {
        self.resolve_with_retries(domain, self.config.max_retries)
            .await
    }

    /// Resolve a domain with an explicit retry bound.
    ///
    /// # Arguments
    ///
    /// * `domain` - Domain as entered by the user
    /// * `retries` - Extra attempts after a connection failure or timeout
    ///
    /// # Returns
    ///
    /// A successful outcome carrying the parsed record (from the registry or
    /// a fallback provider), or a failed outcome carrying the error.
    /// Invalid input and unsupported suffixes fail immediately with server
    /// `"unknown"` and no network traffic.
    pub async fn resolve_with_retries(&self, domain: &str, retries: u32) -> ResolutionOutcome {
        let query = match DomainQuery::parse(domain) {
            Ok(query) => query,
            Err(e) => return ResolutionOutcome::failure(domain.trim(), e, UNKNOWN_SERVER),
        };

        let server = match self.registry.route(&query) {
            Ok(server) => server.to_string(),
            Err(e) => {
                debug!(domain = %query.domain, "no registry for suffix");
                return ResolutionOutcome::failure(query.domain, e, UNKNOWN_SERVER);
            }
        };

        let mut retries_left = retries;
        let raw = loop {
            match self.client.query(&query.domain, &server).await {
                Ok(raw) => break raw,
                Err(e) if e.is_retryable() && retries_left > 0 => {
                    retries_left -= 1;
                    warn!(
                        domain = %query.domain,
                        server = %server,
                        error = %e,
                        retries_left,
                        "query failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => return ResolutionOutcome::failure(query.domain, e, server),
            }
        };

        let record = parser::parse(&raw);
        if record.is_rate_limited {
            warn!(domain = %query.domain, server = %server, "registry throttled, escalating");
            return self.escalate(&query.domain, &server).await;
        }

        ResolutionOutcome::success(query.domain, record, server)
    }

    /// Walk the provider chain until one answers.
    async fn escalate(&self, domain: &str, server: &str) -> ResolutionOutcome {
        let mut failures = Vec::new();

        for provider in &self.providers {
            match provider.query(domain).await {
                Ok(record) => {
                    info!(domain, provider = provider.name(), "resolved via fallback provider");
                    return ResolutionOutcome::success(domain, record, provider.name());
                }
                Err(e) => {
                    warn!(domain, provider = provider.name(), error = %e, "fallback provider failed");
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        let message = if failures.is_empty() {
            "registry throttled the query and no fallback provider is configured".to_string()
        } else {
            format!(
                "registry throttled the query and every fallback provider failed ({})",
                failures.join("; ")
            )
        };
        ResolutionOutcome::failure(domain, ResolveError::rate_limited(server, message), server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::WhoisTransport;
    use crate::types::WhoisRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers every query with the same result and counts calls.
    struct FixedTransport {
        reply: Result<String, ResolveError>,
        calls: AtomicUsize,
    }

    impl FixedTransport {
        fn new(reply: Result<&str, ResolveError>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl WhoisTransport for FixedTransport {
        async fn fetch(&self, _server: &str, _query: &str) -> Result<String, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    struct FakeProvider {
        name: &'static str,
        result: Result<WhoisRecord, ResolveError>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(name: &'static str, result: Result<WhoisRecord, ResolveError>) -> Arc<Self> {
            Arc::new(Self {
                name,
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl FallbackProvider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn query(&self, _domain: &str) -> Result<WhoisRecord, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn chain(providers: &[&Arc<FakeProvider>]) -> Vec<Arc<dyn FallbackProvider>> {
        providers
            .iter()
            .map(|p| Arc::clone(p) as Arc<dyn FallbackProvider>)
            .collect()
    }

    fn resolver(
        transport: Arc<FixedTransport>,
        providers: Vec<Arc<dyn FallbackProvider>>,
    ) -> Resolver {
        Resolver::from_parts(
            ResolveConfig::default(),
            WhoisClient::with_transport(transport),
            providers,
        )
    }

    #[tokio::test]
    async fn test_unsupported_suffix_makes_no_calls() {
        let transport = FixedTransport::new(Ok("unused"));
        let outcome = resolver(transport.clone(), vec![]).resolve("example.zzzz").await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some("unsupported_suffix"));
        assert_eq!(outcome.server, UNKNOWN_SERVER);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_domain_fails_fast() {
        let transport = FixedTransport::new(Ok("unused"));
        let outcome = resolver(transport.clone(), vec![]).resolve("   ").await;

        assert_eq!(outcome.error_kind, Some("invalid_domain"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_failure_retried_to_bound() {
        let transport = FixedTransport::new(Err(ResolveError::connection(
            "whois.verisign-grs.com",
            "connection refused",
        )));
        let started = tokio::time::Instant::now();
        let outcome = resolver(transport.clone(), vec![]).resolve("example.com").await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some("connection"));
        assert_eq!(outcome.server, "whois.verisign-grs.com");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 4);
        assert!(started.elapsed() >= Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_retry_bound() {
        let transport = FixedTransport::new(Err(ResolveError::connection("s", "reset")));
        let outcome = resolver(transport.clone(), vec![])
            .resolve_with_retries("example.com", 0)
            .await;

        assert!(!outcome.success);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_successful_parse() {
        let transport = FixedTransport::new(Ok(
            "Domain Name: EXAMPLE.COM\nRegistrar: Example Corp\nCreation Date: 1995-08-14T04:00:00Z\nDomain Status: active\n",
        ));
        let outcome = resolver(transport, vec![]).resolve("Example.COM").await;

        assert!(outcome.success);
        assert_eq!(outcome.domain, "example.com");
        let record = outcome.record.unwrap();
        assert_eq!(record.registrar.as_deref(), Some("Example Corp"));
        assert_eq!(record.status.as_deref(), Some("active"));
        assert!(!record.is_available);
    }

    #[tokio::test]
    async fn test_throttle_escalates_in_order() {
        let transport = FixedTransport::new(Ok("Rate limit exceeded"));
        let first = FakeProvider::new(
            "jsonwhoisapi",
            Err(ResolveError::rate_limited("jsonwhoisapi", "HTTP 429")),
        );
        let record = WhoisRecord {
            registrar: Some("Example Corp".to_string()),
            ..WhoisRecord::default()
        };
        let second = FakeProvider::new("whoisfreaks", Ok(record));

        let outcome = resolver(transport, chain(&[&first, &second]))
            .resolve("example.com")
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.server, "whoisfreaks");
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_error_also_escalates() {
        let transport = FixedTransport::new(Ok("Please try again later"));
        let broken = FakeProvider::new("jsonwhoisapi", Err(ResolveError::provider("jsonwhoisapi", "401")));
        let working = FakeProvider::new("apininjas", Ok(WhoisRecord::default()));

        let outcome = resolver(transport, chain(&[&broken, &working]))
            .resolve("example.com")
            .await;
        assert_eq!(outcome.server, "apininjas");
    }

    #[tokio::test]
    async fn test_exhausted_chain_reports_rate_limited() {
        let transport = FixedTransport::new(Ok("Too many requests"));
        let first = FakeProvider::new("jsonwhoisapi", Err(ResolveError::rate_limited("jsonwhoisapi", "429")));
        let second = FakeProvider::new("whoisfreaks", Err(ResolveError::provider("whoisfreaks", "500")));

        let outcome = resolver(transport, chain(&[&first, &second]))
            .resolve("example.com")
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some("rate_limited"));
        assert_eq!(outcome.server, "whois.verisign-grs.com");
        let message = outcome.error.unwrap().to_string();
        assert!(message.contains("jsonwhoisapi"));
        assert!(message.contains("whoisfreaks"));
    }

    #[tokio::test]
    async fn test_empty_chain_reports_rate_limited() {
        let transport = FixedTransport::new(Ok("rate limit"));
        let outcome = resolver(transport, vec![]).resolve("example.com").await;
        assert_eq!(outcome.error_kind, Some("rate_limited"));
    }
}
