//! WHOIS protocol client.
//!
//! WHOIS is a plain-text protocol on TCP port 43: the client sends the
//! domain name followed by CRLF and the server writes its reply and closes
//! the connection. Thin registries answer with a pointer to the registrar's
//! own server, so the client follows a bounded chain of referrals.
//!
//! The single-session transport sits behind [`WhoisTransport`] so the
//! referral and timeout logic can be exercised without a network.

use crate::error::ResolveError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Standard WHOIS port.
pub const WHOIS_PORT: u16 = 43;

/// Largest reply kept from one session; anything beyond is discarded.
pub const MAX_REPLY_BYTES: u64 = 1024 * 1024;

/// One request/response session with a WHOIS server.
#[async_trait]
pub trait WhoisTransport: Send + Sync {
    /// Send `query` to `server` and return the complete reply.
    ///
    /// Timeouts are applied by the caller.
    async fn fetch(&self, server: &str, query: &str) -> Result<String, ResolveError>;
}

/// Production transport: a fresh TCP connection per query.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport;

#[async_trait]
impl WhoisTransport for TcpTransport {
    async fn fetch(&self, server: &str, query: &str) -> Result<String, ResolveError> {
        let mut stream = TcpStream::connect((server, WHOIS_PORT))
            .await
            .map_err(|e| ResolveError::connection(server, e.to_string()))?;

        stream
            .write_all(format!("{}\r\n", query).as_bytes())
            .await
            .map_err(|e| ResolveError::connection(server, e.to_string()))?;

        read_reply(&mut stream, server).await
    }
}

/// Read a reply until EOF or [`MAX_REPLY_BYTES`].
async fn read_reply<R>(reader: R, server: &str) -> Result<String, ResolveError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    reader
        .take(MAX_REPLY_BYTES)
        .read_to_end(&mut buf)
        .await
        .map_err(|e| ResolveError::connection(server, e.to_string()))?;

    if buf.len() as u64 == MAX_REPLY_BYTES {
        warn!(server, limit = MAX_REPLY_BYTES, "reply truncated");
    }

    // Some registries send Latin-1; decode lossily instead of failing.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// WHOIS client with timeout and referral handling.
///
/// No retries happen here; the resolver owns the retry policy.
#[derive(Clone)]
pub struct WhoisClient {
    transport: Arc<dyn WhoisTransport>,
    timeout: Duration,
    max_referral_hops: u32,
}

impl WhoisClient {
    /// Create a client using TCP on port 43 with default settings.
    pub fn new() -> Self {
        Self::with_transport(Arc::new(TcpTransport))
    }

    /// Create a client over a custom transport.
    pub fn with_transport(transport: Arc<dyn WhoisTransport>) -> Self {
        Self {
            transport,
            timeout: Duration::from_secs(30),
            max_referral_hops: 3,
        }
    }

    /// Set the per-session timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how many referrals are followed after the first server.
    pub fn with_max_referral_hops(mut self, hops: u32) -> Self {
        self.max_referral_hops = hops;
        self
    }

    /// Query `server` for `domain`, following referrals.
    ///
    /// # Arguments
    ///
    /// * `domain` - The normalized domain name
    /// * `server` - Hostname of the first server to ask
    ///
    /// # Returns
    ///
    /// The reply text of the last server that answered.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Connection` or `ResolveError::Timeout` when the
    /// first server fails. A failing referral hop is logged and the previous
    /// reply is returned instead.
    pub async fn query(&self, domain: &str, server: &str) -> Result<String, ResolveError> {
        let mut reply = self.fetch_once(domain, server).await?;
        let mut visited = vec![server.to_lowercase()];

        for _ in 0..self.max_referral_hops {
            let next = match parse_referral(&reply) {
                Some(next) => next,
                None => break,
            };
            if visited.contains(&next) {
                break;
            }

            debug!(domain, from = %visited[visited.len() - 1], to = %next, "following referral");
            match self.fetch_once(domain, &next).await {
                Ok(text) if !text.trim().is_empty() => {
                    reply = text;
                    visited.push(next);
                }
                Ok(_) => {
                    warn!(domain, server = %next, "empty referral reply, keeping previous");
                    break;
                }
                Err(e) => {
                    warn!(domain, server = %next, error = %e, "referral failed, keeping previous reply");
                    break;
                }
            }
        }

        Ok(reply)
    }

    async fn fetch_once(&self, domain: &str, server: &str) -> Result<String, ResolveError> {
        debug!(domain, server, "whois query");
        match tokio::time::timeout(self.timeout, self.transport.fetch(server, domain)).await {
            Ok(result) => result,
            Err(_) => Err(ResolveError::timeout(server, self.timeout)),
        }
    }
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Find a referral to another WHOIS server in a reply.
///
/// Recognizes `refer:`, `whois:`, `Registrar WHOIS Server:` and
/// `ReferralServer:` lines. `refer:` wins when present; otherwise the first
/// usable line does. Schemes, ports and paths are stripped and the result
/// is lowercased.
///
/// ```text
/// refer:        whois.verisign-grs.com
/// ReferralServer: whois://whois.arin.net:43
/// ```
pub fn parse_referral(reply: &str) -> Option<String> {
    let mut fallback = None;

    for line in reply.lines() {
        let (key, value) = match line.trim().split_once(':') {
            Some(pair) => pair,
            None => continue,
        };
        let key = key.trim().to_lowercase();
        if !matches!(
            key.as_str(),
            "refer" | "whois" | "registrar whois server" | "referralserver"
        ) {
            continue;
        }

        let host = match clean_referral_host(value) {
            Some(host) => host,
            None => continue,
        };
        if key == "refer" {
            return Some(host);
        }
        if fallback.is_none() {
            fallback = Some(host);
        }
    }

    fallback
}

fn clean_referral_host(value: &str) -> Option<String> {
    let mut host = value.trim();
    if let Some((_, rest)) = host.split_once("://") {
        host = rest;
    }
    let host = host
        .split(['/', ':'])
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    if host.is_empty() || !host.contains('.') || host.contains(char::is_whitespace) {
        return None;
    }
    Some(host)
}
