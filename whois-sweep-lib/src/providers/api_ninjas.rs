//! API Ninjas WHOIS, reached through RapidAPI.

use super::{
    env_var, json_date, json_flag, json_hostnames, json_status, json_str, record_from_payload,
    send_json, with_throttle_retry, Backoff, FallbackProvider,
};
use crate::error::ResolveError;
use crate::types::WhoisRecord;
use async_trait::async_trait;
use serde_json::Value;

const NAME: &str = "apininjas";
const RAPIDAPI_HOST: &str = "whois-by-api-ninjas.p.rapidapi.com";
const DEFAULT_BASE_URL: &str = "https://whois-by-api-ninjas.p.rapidapi.com";

/// Client for API Ninjas via RapidAPI (`RAPIDAPI_KEY`).
pub struct ApiNinjasProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    backoff: Backoff,
}

impl ApiNinjasProvider {
    pub fn new(http: reqwest::Client, api_key: Option<String>, backoff: Backoff) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            backoff,
        }
    }

    pub fn from_env(http: reqwest::Client, backoff: Backoff) -> Self {
        Self::new(http, env_var("RAPIDAPI_KEY"), backoff)
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch(&self, domain: &str) -> Result<WhoisRecord, ResolveError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ResolveError::provider(NAME, "missing credentials (set RAPIDAPI_KEY)"))?;

        let request = self
            .http
            .get(format!("{}/v1/whois", self.base_url))
            .query(&[("domain", domain)])
            .header("x-rapidapi-host", RAPIDAPI_HOST)
            .header("x-rapidapi-key", api_key);

        let payload = send_json(request, NAME).await?;
        Ok(map_payload(&payload))
    }
}

#[async_trait]
impl FallbackProvider for ApiNinjasProvider {
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
        json_flag(payload, &["is_registered", "registered"]),
        json_str(payload, &["registrar"]),
        json_date(payload, &["creation_date"]),
        json_date(payload, &["expiration_date"]),
        json_status(payload, &["status"]),
        json_hostnames(payload, &["name_servers"]),
    )
}
