//! JsonWhoisAPI provider.

use super::{
    env_var, json_date, json_flag, json_hostnames, json_status, json_str, record_from_payload,
    send_json, with_throttle_retry, Backoff, FallbackProvider,
};
use crate::error::ResolveError;
use crate::types::WhoisRecord;
use async_trait::async_trait;
use serde_json::Value;

const NAME: &str = "jsonwhoisapi";
const DEFAULT_BASE_URL: &str = "https://jsonwhoisapi.com";

/// Client for `jsonwhoisapi.com`, authenticated with HTTP Basic
/// (`JSONWHOIS_ACCOUNT` / `JSONWHOIS_API_KEY`).
pub struct JsonWhoisProvider {
    http: reqwest::Client,
    base_url: String,
    account: Option<String>,
    api_key: Option<String>,
    backoff: Backoff,
}

impl JsonWhoisProvider {
    pub fn new(
        http: reqwest::Client,
        account: Option<String>,
        api_key: Option<String>,
        backoff: Backoff,
    ) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            account,
            api_key,
            backoff,
        }
    }

    pub fn from_env(http: reqwest::Client, backoff: Backoff) -> Self {
        Self::new(
            http,
            env_var("JSONWHOIS_ACCOUNT"),
            env_var("JSONWHOIS_API_KEY"),
            backoff,
        )
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch(&self, domain: &str) -> Result<WhoisRecord, ResolveError> {
        let (account, api_key) = match (&self.account, &self.api_key) {
            (Some(account), Some(key)) => (account, key),
            _ => {
                return Err(ResolveError::provider(
                    NAME,
                    "missing credentials (set JSONWHOIS_ACCOUNT and JSONWHOIS_API_KEY)",
                ))
            }
        };

        let request = self
            .http
            .get(format!("{}/api/v1/whois", self.base_url))
            .query(&[("identifier", domain)])
            .basic_auth(account, Some(api_key));

        let payload = send_json(request, NAME).await?;
        Ok(map_payload(&payload))
    }
}

#[async_trait]
impl FallbackProvider for JsonWhoisProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn query(&self, domain: &str) -> Result<WhoisRecord, ResolveError> {
        with_throttle_retry(NAME, self.backoff, || self.fetch(domain)).await
    }
}

fn map_payload(payload: &Value) -> WhoisRecord {
    // `registered` is authoritative; `available` is its inverse.
    let registered = json_flag(payload, &["registered"])
        .or_else(|| json_flag(payload, &["available"]).map(|available| !available));

    record_from_payload(
        payload,
        registered,
        json_str(payload, &["registrar.name", "registrar"]),
        json_date(payload, &["created", "created_date"]),
        json_date(payload, &["expires", "expires_date"]),
        json_status(payload, &["status"]),
        json_hostnames(payload, &["nameservers", "name_servers"]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::serve_once;
    use crate::types::RecordDate;
    use serde_json::json;

    #[test]
    fn test_map_registered_payload() {
        let payload = json!({
            "name": "example.com",
            "registered": true,
            "created": "1995-08-14 04:00:00",
            "expires": "2027-08-13 04:00:00",
            "status": ["clientDeleteProhibited", "clientTransferProhibited"],
            "registrar": { "id": "292", "name": "Example Corp", "url": "https://example.net" },
            "nameservers": [{ "name": "a.iana-servers.net" }, { "name": "b.iana-servers.net" }]
        });
        let record = map_payload(&payload);

        assert_eq!(record.registrar.as_deref(), Some("Example Corp"));
        assert!(matches!(record.creation_date, Some(RecordDate::Parsed(_))));
        assert_eq!(
            record.status.as_deref(),
            Some("clientDeleteProhibited, clientTransferProhibited")
        );
        assert_eq!(
            record.name_servers,
            vec!["a.iana-servers.net", "b.iana-servers.net"]
        );
        assert!(!record.is_available);
        assert!(record.raw_text.contains("\"registered\": true"));
    }

    #[test]
    fn test_map_available_payload() {
        let record = map_payload(&json!({ "name": "free-name.com", "available": true }));
        assert!(record.is_available);
        assert_eq!(record.registrar, None);
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let provider = JsonWhoisProvider::new(reqwest::Client::new(), None, None, Backoff::none());
        let err = provider.query("example.com").await.unwrap_err();
        assert_eq!(err.kind(), "provider");
    }

    #[tokio::test]
    async fn test_query_sends_basic_auth() {
        let body = r#"{"registered": true, "registrar": {"name": "Example Corp"}}"#;
        let (base, server) = serve_once("200 OK", &[("Content-Type", "application/json")], body).await;

        let provider = JsonWhoisProvider::new(
            reqwest::Client::new(),
            Some("acct".to_string()),
            Some("secret".to_string()),
            Backoff::none(),
        )
        .with_base_url(base);

        let record = provider.query("example.com").await.unwrap();
        let request = server.await.unwrap();

        assert_eq!(record.registrar.as_deref(), Some("Example Corp"));
        assert!(request.starts_with("GET /api/v1/whois?identifier=example.com "));
        // base64("acct:secret")
        assert!(request.to_lowercase().contains("authorization: basic ywnjddpzzwnyzxq="));
    }
}
