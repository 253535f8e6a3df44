//! Error handling for domain resolution.
//!
//! This module defines the single error type that covers every way a
//! resolution can fail, from unroutable suffixes to exhausted provider chains.

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Main error type for resolution operations.
///
/// Per-domain failures are carried inside a `ResolutionOutcome` rather than
/// returned, so this type is `Clone` and cheap to store.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// Input that is not a usable domain name
    InvalidDomain { domain: String, reason: String },

    /// Suffix absent from the registry map
    UnsupportedSuffix { domain: String, suffix: String },

    /// Connection refused, reset, or a malformed reply
    Connection { server: String, message: String },

    /// The session did not complete within the configured timeout
    Timeout { server: String, duration: Duration },

    /// The registry or a provider is throttling requests
    RateLimited {
        service: String,
        message: String,
        retry_after: Option<Duration>,
    },

    /// A fallback provider answered with something other than a record
    Provider {
        provider: String,
        message: String,
        status_code: Option<u16>,
    },

    /// JSON decoding failures for provider payloads
    Parse {
        message: String,
        content: Option<String>,
    },

    /// Invalid configuration values or files
    Config { message: String },

    /// I/O errors when reading domain lists
    File { path: String, message: String },

    /// Broken invariants that don't fit other categories
    Internal { message: String },
}

impl ResolveError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new unsupported suffix error.
    pub fn unsupported_suffix<D: Into<String>, S: Into<String>>(domain: D, suffix: S) -> Self {
        Self::UnsupportedSuffix {
            domain: domain.into(),
            suffix: suffix.into(),
        }
    }

    /// Create a new connection error.
    pub fn connection<S: Into<String>, M: Into<String>>(server: S, message: M) -> Self {
        Self::Connection {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(server: S, duration: Duration) -> Self {
        Self::Timeout {
            server: server.into(),
            duration,
        }
    }

    /// Create a new rate-limit error.
    pub fn rate_limited<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::RateLimited {
            service: service.into(),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a new provider error.
    pub fn provider<P: Into<String>, M: Into<String>>(provider: P, message: M) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a new provider error with HTTP status code.
    pub fn provider_with_status<P: Into<String>, M: Into<String>>(
        provider: P,
        message: M,
        status_code: u16,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::File {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable snake_case tag used in serialized outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDomain { .. } => "invalid_domain",
            Self::UnsupportedSuffix { .. } => "unsupported_suffix",
            Self::Connection { .. } => "connection",
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::Provider { .. } => "provider",
            Self::Parse { .. } => "parse",
            Self::Config { .. } => "config",
            Self::File { .. } => "file",
            Self::Internal { .. } => "internal",
        }
    }

    /// Whether the resolver should spend a retry on this error.
    ///
    /// Only transient connectivity failures qualify. Throttling has its own
    /// escalation path.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// Whether this error reports provider or registry throttling.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::UnsupportedSuffix { domain, suffix } => {
                write!(f, "Unsupported suffix '{}' for '{}'", suffix, domain)
            }
            Self::Connection { server, message } => {
                write!(f, "Connection to {} failed: {}", server, message)
            }
            Self::Timeout { server, duration } => {
                write!(f, "Timeout after {:?} waiting for {}", duration, server)
            }
            Self::RateLimited {
                service,
                message,
                retry_after,
            } => {
                if let Some(retry) = retry_after {
                    write!(
                        f,
                        "Rate limited by {} (retry after {:?}): {}",
                        service, retry, message
                    )
                } else {
                    write!(f, "Rate limited by {}: {}", service, message)
                }
            }
            Self::Provider {
                provider,
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "Provider {} error (HTTP {}): {}", provider, code, message)
                } else {
                    write!(f, "Provider {} error: {}", provider, message)
                }
            }
            Self::Parse { message, content: _ } => {
                write!(f, "Parse error: {}", message)
            }
            Self::Config { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::File { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Outcomes carry the error as its display string.
impl Serialize for ResolveError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// Implement From conversions for common error types
impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        let target = err
            .url()
            .and_then(|u| u.host_str())
            .unwrap_or("provider")
            .to_string();
        if err.is_timeout() {
            Self::provider(target, format!("request timed out: {}", err))
        } else if err.is_connect() {
            Self::provider(target, format!("connection failed: {}", err))
        } else {
            Self::provider(target, format!("HTTP request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            message: format!("JSON parsing failed: {}", err),
            content: None,
        }
    }
}

impl From<std::io::Error> for ResolveError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connectivity_is_retryable() {
        assert!(ResolveError::connection("whois.example", "refused").is_retryable());
        assert!(ResolveError::timeout("whois.example", Duration::from_secs(30)).is_retryable());

        assert!(!ResolveError::rate_limited("whois.example", "slow down").is_retryable());
        assert!(!ResolveError::unsupported_suffix("a.zzzz", "zzzz").is_retryable());
        assert!(!ResolveError::provider("whoisfreaks", "bad key").is_retryable());
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(
            ResolveError::unsupported_suffix("a.zzzz", "zzzz").kind(),
            "unsupported_suffix"
        );
        assert_eq!(
            ResolveError::timeout("s", Duration::from_secs(1)).kind(),
            "timeout"
        );
        assert_eq!(ResolveError::rate_limited("s", "m").kind(), "rate_limited");
    }

    #[test]
    fn test_display_includes_context() {
        let err = ResolveError::provider_with_status("jsonwhoisapi", "Unauthorized", 401);
        assert_eq!(
            err.to_string(),
            "Provider jsonwhoisapi error (HTTP 401): Unauthorized"
        );

        let err = ResolveError::unsupported_suffix("example.zzzz", "zzzz");
        assert_eq!(err.to_string(), "Unsupported suffix 'zzzz' for 'example.zzzz'");
    }

    #[test]
    fn test_serializes_as_message() {
        let err = ResolveError::connection("whois.nic.io", "connection reset");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json, "Connection to whois.nic.io failed: connection reset");
    }
}
