//! Saved-domain persistence.
//!
//! The HTTP layer talks to a [`SavedDomainStore`]; the resolver and the
//! batch scheduler never do. [`MemoryStore`] keeps everything in process
//! memory and is lost on restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// A domain the user chose to keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDomain {
    pub id: u64,
    pub domain: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The domain is already saved.
    Conflict { domain: String },
    /// No record has this id.
    NotFound { id: u64 },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict { domain } => write!(f, "Domain '{}' is already saved", domain),
            Self::NotFound { id } => write!(f, "No saved domain with id {}", id),
        }
    }
}

impl std::error::Error for StoreError {}

#[async_trait]
pub trait SavedDomainStore: Send + Sync {
    async fn exists(&self, domain: &str) -> bool;

    /// Save a domain. Fails with `Conflict` if it is already saved.
    async fn create(&self, domain: &str) -> Result<SavedDomain, StoreError>;

    /// All saved domains, newest first.
    async fn list(&self) -> Vec<SavedDomain>;

    async fn delete(&self, id: u64) -> Result<(), StoreError>;
}

/// In-memory store. Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct MemoryStore {
    records: RwLock<Vec<SavedDomain>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SavedDomainStore for MemoryStore {
    async fn exists(&self, domain: &str) -> bool {
        self.records.read().await.iter().any(|r| r.domain == domain)
    }

    async fn create(&self, domain: &str) -> Result<SavedDomain, StoreError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.domain == domain) {
            return Err(StoreError::Conflict {
                domain: domain.to_string(),
            });
        }

        let record = SavedDomain {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            domain: domain.to_string(),
            created_at: Utc::now(),
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> Vec<SavedDomain> {
        // Insertion order is creation order.
        self.records.read().await.iter().rev().cloned().collect()
    }

    async fn delete(&self, id: u64) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_conflict() {
        let store = MemoryStore::new();
        let first = store.create("example.com").await.unwrap();
        assert_eq!(first.id, 1);
        assert!(store.exists("example.com").await);
        assert!(!store.exists("example.org").await);

        let err = store.create("example.com").await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Conflict {
                domain: "example.com".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = MemoryStore::new();
        store.create("a.com").await.unwrap();
        store.create("b.com").await.unwrap();
        store.create("c.com").await.unwrap();

        let domains: Vec<String> = store.list().await.into_iter().map(|r| r.domain).collect();
        assert_eq!(domains, vec!["c.com", "b.com", "a.com"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        let saved = store.create("a.com").await.unwrap();

        store.delete(saved.id).await.unwrap();
        assert!(!store.exists("a.com").await);
        assert_eq!(
            store.delete(saved.id).await,
            Err(StoreError::NotFound { id: saved.id })
        );

        // Ids are not reused after a delete.
        assert_eq!(store.create("a.com").await.unwrap().id, 2);
    }
}
