//! SQLite-backed document store.
//!
//! Every document is one row holding its fields as a JSON object. This is the
//! backend for working without a managed database and the one the tests run
//! against (in memory).

use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::{Document, DocumentStore, NewDocument, Query, StoreError};

pub struct LocalStore {
    conn: Mutex<Connection>,
    label: String,
}

impl LocalStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    StoreError::Backend(format!(
                        "failed to create store directory {}: {}",
                        parent.display(),
                        err
                    ))
                })?;
            }
        }
        let conn = Connection::open(path).map_err(backend)?;
        let store = Self {
            conn: Mutex::new(conn),
            label: format!("local:{}", path.display()),
        };
        store.setup()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        let store = Self {
            conn: Mutex::new(conn),
            label: "local:memory".to_string(),
        };
        store.setup()?;
        Ok(store)
    }

    fn setup(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
              collection TEXT NOT NULL,
              id         TEXT NOT NULL,
              data       TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
        "#,
        )
        .map_err(backend)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("local store lock poisoned".to_string()))
    }

    /// Insert or replace a document under a caller-chosen id. Used to seed
    /// the store; the application itself never creates contacts or listings.
    pub fn put(&self, collection: &str, id: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let data = serde_json::to_string(&Value::Object(fields)).map_err(|err| StoreError::Backend(err.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO documents (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![collection, id, data, now_rfc3339()],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn list_sync(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, data FROM documents WHERE collection = ?1 ORDER BY rowid")
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![collection], |row| {
                let id: String = row.get(0)?;
                let data: String = row.get(1)?;
                Ok((id, data))
            })
            .map_err(backend)?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, data) = row.map_err(backend)?;
            docs.push(decode(id, &data)?);
        }
        Ok(docs)
    }

    fn get_sync(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let conn = self.lock()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;
        data.map(|data| decode(id.to_string(), &data)).transpose()
    }

    fn update_sync(&self, collection: &str, id: &str, fields: &Map<String, Value>) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(backend)?;
        let data: Option<String> = tx
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;
        let Some(data) = data else {
            return Err(StoreError::NotFound(format!("{}/{}", collection, id)));
        };

        let mut doc = decode(id.to_string(), &data)?;
        for (key, value) in fields {
            doc.fields.insert(key.clone(), value.clone());
        }
        let encoded = serde_json::to_string(&Value::Object(doc.fields)).map_err(|err| StoreError::Backend(err.to_string()))?;
        tx.execute(
            "UPDATE documents SET data = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4",
            params![encoded, now_rfc3339(), collection, id],
        )
        .map_err(backend)?;
        tx.commit().map_err(backend)?;
        Ok(())
    }

    fn add_sync(&self, collection: &str, doc: NewDocument) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let mut fields = doc.fields;
        let stamp = now_rfc3339();
        for name in doc.server_timestamps {
            fields.insert(name, Value::String(stamp.clone()));
        }
        self.put(collection, &id, fields)?;
        Ok(id)
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.list_sync(collection)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.get_sync(collection, id)
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let mut docs: Vec<Document> = self
            .list_sync(collection)?
            .into_iter()
            .filter(|doc| query.matches(&doc.fields))
            .collect();
        if let Some(field) = &query.order_by {
            docs.sort_by(|a, b| compare_values(a.fields.get(field), b.fields.get(field)));
        }
        Ok(docs)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        self.update_sync(collection, id, fields)
    }

    async fn add(&self, collection: &str, doc: NewDocument) -> Result<String, StoreError> {
        self.add_sync(collection, doc)
    }
}

fn decode(id: String, data: &str) -> Result<Document, StoreError> {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(fields)) => Ok(Document { id, fields }),
        Ok(_) => Err(StoreError::Malformed {
            id,
            message: "stored data is not an object".to_string(),
        }),
        Err(err) => Err(StoreError::Malformed {
            id,
            message: err.to_string(),
        }),
    }
}

/// Missing values sort first, then numbers, then everything else as text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_put_list_get() {
        let store = LocalStore::open_in_memory().unwrap();
        store.put("contacts", "b", obj(json!({"firstName": "Bo"}))).unwrap();
        store.put("contacts", "a", obj(json!({"firstName": "Al"}))).unwrap();
        store.put("listings", "x", obj(json!({"city": "Austin"}))).unwrap();

        let docs = store.list("contacts").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "b");

        let doc = store.get("listings", "x").await.unwrap().unwrap();
        assert_eq!(doc.fields["city"], json!("Austin"));
        assert!(store.get("listings", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_only_given_fields() {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .put("contacts", "c1", obj(json!({"firstName": "Jane", "phone": "1"})))
            .unwrap();

        store
            .update("contacts", "c1", &obj(json!({"phone": "2"})))
            .await
            .unwrap();

        let doc = store.get("contacts", "c1").await.unwrap().unwrap();
        assert_eq!(doc.fields["firstName"], json!("Jane"));
        assert_eq!(doc.fields["phone"], json!("2"));
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let store = LocalStore::open_in_memory().unwrap();
        let err = store
            .update("contacts", "ghost", &obj(json!({"phone": "2"})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_stamps_server_timestamp() {
        let store = LocalStore::open_in_memory().unwrap();
        let id = store
            .add(
                "contactLists",
                NewDocument {
                    fields: obj(json!({"name": "Investors", "contactIds": ["a", "b"]})),
                    server_timestamps: vec!["createdAt".to_string()],
                },
            )
            .await
            .unwrap();

        let doc = store.get("contactLists", &id).await.unwrap().unwrap();
        let stamp = doc.fields["createdAt"].as_str().unwrap();
        assert!(OffsetDateTime::parse(stamp, &Rfc3339).is_ok());
        assert_eq!(doc.fields["contactIds"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_query_filters_and_orders() {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .put("activities", "1", obj(json!({"listingId": "l1", "type": "tour", "timestamp": "2024-05-02T00:00:00Z"})))
            .unwrap();
        store
            .put("activities", "2", obj(json!({"listingId": "l1", "type": "call", "timestamp": "2024-05-01T00:00:00Z"})))
            .unwrap();
        store
            .put("activities", "3", obj(json!({"listingId": "l1", "type": "tour", "timestamp": "2024-04-30T00:00:00Z"})))
            .unwrap();
        store
            .put("activities", "4", obj(json!({"listingId": "l2", "type": "tour", "timestamp": "2024-04-01T00:00:00Z"})))
            .unwrap();

        let query = Query::new()
            .where_eq("listingId", "l1")
            .where_eq("type", "tour")
            .order_by("timestamp");
        let docs = store.query("activities", &query).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1"]);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.db");
        let store = LocalStore::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.describe().starts_with("local:"));
    }
}
