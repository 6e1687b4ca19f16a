//! Document store abstraction.
//!
//! This module provides:
//! - `DocumentStore` trait: the get/query/update/add surface the rest of the
//!   crate talks to
//! - `FirestoreStore`: the managed backend, spoken to over its REST API
//! - `LocalStore`: a SQLite file holding one JSON object per document
//! - `UnconfiguredStore`: stands in when the `[store]` section is unusable so
//!   every call reports a configuration error instead of the process exiting

pub mod firestore;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

/// A stored record: its id plus the plain JSON object of its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// Fields of a document about to be created. Names listed in
/// `server_timestamps` are filled in by the store at write time.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub fields: Map<String, Value>,
    pub server_timestamps: Vec<String>,
}

/// Equality-filtered, optionally ordered query over one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub equals: Vec<(String, Value)>,
    pub order_by: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    pub fn matches(&self, fields: &Map<String, Value>) -> bool {
        self.equals
            .iter()
            .all(|(field, expected)| fields.get(field) == Some(expected))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store is not configured: {0}")]
    NotConfigured(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed document {id}: {message}")]
    Malformed { id: String, message: String },
    #[error("{0}")]
    Backend(String),
}

/// Interface every backend implements. All calls are one-shot; there is no
/// caching or subscription layer.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short name for status lines and logs.
    fn describe(&self) -> String;

    /// Fetch every document of a collection.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Fetch one document; `Ok(None)` when it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Write only the given fields of an existing document.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Create a document with a store-assigned id and return that id.
    async fn add(&self, collection: &str, doc: NewDocument) -> Result<String, StoreError>;
}

/// Backend used when the configuration cannot produce a working store.
pub struct UnconfiguredStore {
    reason: String,
}

impl UnconfiguredStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> StoreError {
        StoreError::NotConfigured(self.reason.clone())
    }
}

#[async_trait]
impl DocumentStore for UnconfiguredStore {
    fn describe(&self) -> String {
        "unconfigured".to_string()
    }

    async fn list(&self, _collection: &str) -> Result<Vec<Document>, StoreError> {
        Err(self.error())
    }

    async fn get(&self, _collection: &str, _id: &str) -> Result<Option<Document>, StoreError> {
        Err(self.error())
    }

    async fn query(&self, _collection: &str, _query: &Query) -> Result<Vec<Document>, StoreError> {
        Err(self.error())
    }

    async fn update(
        &self,
        _collection: &str,
        _id: &str,
        _fields: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        Err(self.error())
    }

    async fn add(&self, _collection: &str, _doc: NewDocument) -> Result<String, StoreError> {
        Err(self.error())
    }
}

/// Build the configured backend. Configuration problems do not abort: they
/// produce an [`UnconfiguredStore`] whose errors surface in the UI.
pub fn connect(config: &StoreConfig) -> Arc<dyn DocumentStore> {
    match config.backend {
        StoreBackend::Firestore => match firestore::FirestoreStore::new(config) {
            Ok(store) => {
                tracing::info!(store = %store.describe(), "document store ready");
                Arc::new(store)
            }
            Err(err) => {
                tracing::error!(error = %err, "firestore store not configured");
                Arc::new(UnconfiguredStore::new(err.to_string()))
            }
        },
        StoreBackend::Local => match local::LocalStore::open(&config.path) {
            Ok(store) => {
                tracing::info!(store = %store.describe(), "document store ready");
                Arc::new(store)
            }
            Err(err) => {
                tracing::error!(error = %err, path = %config.path.display(), "local store unavailable");
                Arc::new(UnconfiguredStore::new(err.to_string()))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_matches() {
        let query = Query::new()
            .where_eq("listingId", "l1")
            .where_eq("type", "tour")
            .order_by("timestamp");
        let fields = json!({"listingId": "l1", "type": "tour", "notes": "x"});
        assert!(query.matches(fields.as_object().unwrap()));

        let other = json!({"listingId": "l1", "type": "call"});
        assert!(!query.matches(other.as_object().unwrap()));
    }

    #[tokio::test]
    async fn test_unconfigured_store_reports_configuration_error() {
        let store = UnconfiguredStore::new("missing project_id");
        let err = store.list("contacts").await.unwrap_err();
        assert!(matches!(err, StoreError::NotConfigured(ref reason) if reason == "missing project_id"));
    }
}
