//! WhoisFreaks provider (live lookups).

use super::{
    env_var, json_date, json_flag, json_hostnames, json_status, json_str, record_from_payload,
    send_json, with_throttle_retry, Backoff, FallbackProvider,
};
use crate::error::ResolveError;
use crate::types::WhoisRecord;
use async_trait::async_trait;
use serde_json::Value;

const NAME: &str = "whoisfreaks";
const DEFAULT_BASE_URL: &str = "https://api.whoisfreaks.com";

/// Client for the WhoisFreaks live WHOIS API (`WHOISFREAKS_API_KEY`).
pub struct WhoisFreaksProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    backoff: Backoff,
}

impl WhoisFreaksProvider {
    pub fn new(http: reqwest::Client, api_key: Option<String>, backoff: Backoff) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            backoff,
        }
    }

    pub fn from_env(http: reqwest::Client, backoff: Backoff) -> Self {
        Self::new(http, env_var("WHOISFREAKS_API_KEY"), backoff)
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch(&self, domain: &str) -> Result<WhoisRecord, ResolveError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ResolveError::provider(NAME, "missing credentials (set WHOISFREAKS_API_KEY)")
        })?;

        let request = self
            .http
            .get(format!("{}/v1.0/whois", self.base_url))
            .query(&[("apiKey", api_key), ("domainName", domain), ("type", "live")]);

        let payload = send_json(request, NAME).await?;
        Ok(map_payload(&payload))
    }
}

#[async_trait]
impl FallbackProvider for WhoisFreaksProvider {
    fn name(&self) -> &str {
        NAME
    }

    async fn query(&self, domain: &str) -> Result<WhoisRecord, ResolveError> {
        with_throttle_retry(NAME, self.backoff, || self.fetch(domain)).await
    }
}

fn map_payload(payload: &Value) -> WhoisRecord {
    record_from_payload(
        payload,
        json_flag(payload, &["domain_registered", "is_registered"]),
        json_str(
            payload,
            &["domain_registrar.registrar_name", "registrar.name"],
        ),
        json_date(payload, &["create_date", "created_date"]),
        json_date(payload, &["expiry_date", "expires_date"]),
        json_status(payload, &["domain_status", "status"]),
        json_hostnames(payload, &["name_servers"]),
    )
}
