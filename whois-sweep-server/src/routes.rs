//! HTTP handlers.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST | `/api/whois` | [`resolve_batch`] |
//! | GET | `/api/whois-progress` | [`progress`] |
//! | POST | `/api/save-domain` | [`save_domain`] |
//! | GET | `/api/check-domain?domain=` | [`check_domain`] |
//! | GET | `/api/saved-domains` | [`list_saved`] |
//! | DELETE | `/api/saved-domains/:id` | [`delete_saved`] |
//!
//! Failures are `{ "error": message }` bodies with a 4xx/5xx status.

use crate::store::{SavedDomain, SavedDomainStore, StoreError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use whois_sweep_lib::{
    expand_domain_inputs, BatchJob, BatchScheduler, ProgressSnapshot, ProgressTracker,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    scheduler: BatchScheduler,
    /// Tracker of the most recently started batch.
    latest: Arc<RwLock<ProgressTracker>>,
    store: Arc<dyn SavedDomainStore>,
}

impl AppState {
    pub fn new(scheduler: BatchScheduler, store: Arc<dyn SavedDomainStore>) -> Self {
        Self {
            scheduler,
            latest: Arc::new(RwLock::new(ProgressTracker::default())),
            store,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/whois", post(resolve_batch))
        .route("/api/whois-progress", get(progress))
        .route("/api/save-domain", post(save_domain))
        .route("/api/check-domain", get(check_domain))
        .route("/api/saved-domains", get(list_saved))
        .route("/api/saved-domains/:id", delete(delete_saved))
        .with_state(state)
}

/// Error response: `{ "error": message }` with a status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request<M: Into<String>>(message: M) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found<M: Into<String>>(message: M) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal<M: Into<String>>(message: M) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict { .. } => ApiError::bad_request(e.to_string()),
            StoreError::NotFound { .. } => ApiError::not_found(e.to_string()),
        }
    }
}

/// Pull a non-empty list of strings out of `{ "domains": [...] }`.
fn requested_domains(body: &Value) -> Result<Vec<String>, ApiError> {
    let invalid = || ApiError::bad_request("A non-empty list of domains is required");

    let items = body
        .get("domains")
        .and_then(Value::as_array)
        .ok_or_else(invalid)?;
    if items.is_empty() {
        return Err(invalid());
    }
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

/// Optional `"tlds": [...]` for expanding bare names.
fn requested_tlds(body: &Value) -> Result<Option<Vec<String>>, ApiError> {
    let Some(tlds) = body.get("tlds") else {
        return Ok(None);
    };
    let invalid = || ApiError::bad_request("tlds must be a list of strings");
    tlds.as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Resolve a batch and answer with every outcome.
///
/// Bare names (no dot) expand across `tlds`, or the default suffixes.
///
/// The batch runs on its own task. If the client goes away the handler is
/// dropped, the guard cancels the token, and the job stops at the next
/// chunk boundary.
pub async fn resolve_batch(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let domains = requested_domains(&body)?;
    let tlds = requested_tlds(&body)?;

    let job = BatchJob::new(expand_domain_inputs(&domains, &tlds));
    *state.latest.write().await = job.progress();
    info!(domains = job.len(), "batch started");

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let scheduler = state.scheduler.clone();
    let handle = tokio::spawn(async move { scheduler.run(job, &cancel, |_| {}).await });

    let report = handle.await.map_err(|e| {
        error!(error = %e, "batch task failed");
        ApiError::internal("WHOIS batch failed")
    });
    guard.disarm();
    let report = report?;

    if report.cancelled {
        warn!(completed = report.outcomes.len(), "batch cancelled");
    }
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "batch finished"
    );
    Ok(Json(json!({ "results": report.outcomes })))
}

/// Progress of the most recently started batch (zeros if none).
pub async fn progress(State(state): State<AppState>) -> Json<ProgressSnapshot> {
    Json(state.latest.read().await.snapshot())
}

#[derive(Debug, Deserialize)]
pub struct SaveDomainRequest {
    domain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckDomainParams {
    domain: Option<String>,
}

fn required_domain(domain: Option<String>) -> Result<String, ApiError> {
    domain
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::bad_request("A domain is required"))
}

pub async fn save_domain(
    State(state): State<AppState>,
    body: Result<Json<SaveDomainRequest>, JsonRejection>,
) -> Result<Json<SavedDomain>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let domain = required_domain(request.domain)?;
    Ok(Json(state.store.create(&domain).await?))
}

pub async fn check_domain(
    State(state): State<AppState>,
    Query(params): Query<CheckDomainParams>,
) -> Result<Json<Value>, ApiError> {
    let domain = required_domain(params.domain)?;
    let exists = state.store.exists(&domain).await;
    Ok(Json(json!({ "exists": exists })))
}

pub async fn list_saved(State(state): State<AppState>) -> Json<Vec<SavedDomain>> {
    Json(state.store.list().await)
}

pub async fn delete_saved(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: u64 = id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid id '{}'", id)))?;
    state.store.delete(id).await?;
    Ok(Json(json!({ "success": true })))
}
