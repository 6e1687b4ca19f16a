//! Firestore backend over the v1 REST API.
//!
//! Documents travel as Firestore's typed value encoding
//! (`{"stringValue": "..."}`, `{"mapValue": {"fields": ...}}`, ...); this
//! module converts to and from plain JSON so the rest of the crate never sees
//! it.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Number, Value};

use super::{Document, DocumentStore, NewDocument, Query, StoreError};
use crate::config::{request_timeout, StoreConfig};

const FIRESTORE_API_BASE: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: u32 = 300;

pub struct FirestoreStore {
    client: Client,
    api_base: String,
    project_id: String,
    database: String,
    api_key: Option<String>,
    auth_token: Option<String>,
}

impl FirestoreStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let project_id = config
            .project_id
            .clone()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| StoreError::NotConfigured("store.project_id is not set".to_string()))?;

        let client = Client::builder()
            .timeout(request_timeout(config.timeout_secs))
            .build()
            .map_err(|err| StoreError::NotConfigured(format!("failed to create HTTP client: {}", err)))?;

        Ok(Self {
            client,
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| FIRESTORE_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            project_id,
            database: config.database.clone(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            auth_token: config.auth_token.clone().filter(|token| !token.is_empty()),
        })
    }

    /// Resource name of the documents root, as used inside request bodies.
    fn documents_name(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }

    fn documents_url(&self) -> String {
        format!("{}/{}", self.api_base, self.documents_name())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match &self.api_key {
            Some(key) => request.query(&[("key", key.as_str())]),
            None => request,
        };
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, StoreError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| StoreError::Network(format!("{}: {}", what, err)))?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body, what))
    }

    async fn json_body(response: Response, what: &str) -> Result<Value, StoreError> {
        response
            .json::<Value>()
            .await
            .map_err(|err| StoreError::Backend(format!("{}: invalid response body: {}", what, err)))
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn describe(&self) -> String {
        format!("firestore:{}", self.project_id)
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let url = format!("{}/{}", self.documents_url(), collection);
        let mut docs = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let what = format!("list {}", collection);
            let response = self.send(request, &what).await?;
            let body = Self::json_body(response, &what).await?;

            if let Some(items) = body.get("documents").and_then(Value::as_array) {
                for item in items {
                    docs.push(decode_document(item)?);
                }
            }

            page_token = body
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|token| !token.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }

        tracing::debug!(collection, count = docs.len(), "listed documents");
        Ok(docs)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let url = format!("{}/{}/{}", self.documents_url(), collection, id);
        let what = format!("get {}/{}", collection, id);
        match self.send(self.client.get(&url), &what).await {
            Ok(response) => {
                let body = Self::json_body(response, &what).await?;
                Ok(Some(decode_document(&body)?))
            }
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let url = format!("{}:runQuery", self.documents_url());
        let body = json!({ "structuredQuery": structured_query(collection, query) });
        let what = format!("query {}", collection);
        let response = self.send(self.client.post(&url).json(&body), &what).await?;
        let rows = Self::json_body(response, &what).await?;

        let mut docs = Vec::new();
        for row in rows.as_array().into_iter().flatten() {
            // Rows without a document only carry read metadata.
            if let Some(doc) = row.get("document") {
                docs.push(decode_document(doc)?);
            }
        }
        Ok(docs)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let url = format!("{}/{}/{}", self.documents_url(), collection, id);
        let mut params: Vec<(&str, String)> = fields
            .keys()
            .map(|key| ("updateMask.fieldPaths", field_path(key)))
            .collect();
        params.push(("currentDocument.exists", "true".to_string()));

        let body = json!({ "fields": encode_fields(fields) });
        let what = format!("update {}/{}", collection, id);
        self.send(self.client.patch(&url).query(&params).json(&body), &what)
            .await?;
        tracing::info!(collection, id, fields = fields.len(), "document updated");
        Ok(())
    }

    async fn add(&self, collection: &str, doc: NewDocument) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("{}/{}/{}", self.documents_name(), collection, id);
        let transforms: Vec<Value> = doc
            .server_timestamps
            .iter()
            .map(|field| json!({ "fieldPath": field_path(field), "setToServerValue": "REQUEST_TIME" }))
            .collect();

        let body = json!({
            "writes": [{
                "update": { "name": name, "fields": encode_fields(&doc.fields) },
                "updateTransforms": transforms,
                "currentDocument": { "exists": false }
            }]
        });
        let url = format!("{}:commit", self.documents_url());
        let what = format!("create in {}", collection);
        self.send(self.client.post(&url).json(&body), &what).await?;
        tracing::info!(collection, id = %id, "document created");
        Ok(id)
    }
}

fn structured_query(collection: &str, query: &Query) -> Value {
    let mut structured = json!({ "from": [{ "collectionId": collection }] });

    if !query.equals.is_empty() {
        let filters: Vec<Value> = query
            .equals
            .iter()
            .map(|(field, value)| {
                json!({
                    "fieldFilter": {
                        "field": { "fieldPath": field_path(field) },
                        "op": "EQUAL",
                        "value": encode_value(value)
                    }
                })
            })
            .collect();
        structured["where"] = json!({
            "compositeFilter": { "op": "AND", "filters": filters }
        });
    }

    if let Some(order) = &query.order_by {
        structured["orderBy"] = json!([{
            "field": { "fieldPath": field_path(order) },
            "direction": "ASCENDING"
        }]);
    }

    structured
}

/// Field names outside `[A-Za-z_][A-Za-z0-9_]*` must be backtick-quoted in
/// field paths (e.g. "SF available").
pub fn field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn status_error(status: StatusCode, body: &str, what: &str) -> StoreError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    let detail = format!("{}: {}", what, message);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied(detail),
        StatusCode::NOT_FOUND => StoreError::NotFound(detail),
        _ => StoreError::Backend(format!("{} ({})", detail, status.as_u16())),
    }
}

fn decode_document(value: &Value) -> Result<Document, StoreError> {
    let name = value.get("name").and_then(Value::as_str).unwrap_or_default();
    let id = name.rsplit('/').next().unwrap_or_default().to_string();
    if id.is_empty() {
        return Err(StoreError::Malformed {
            id: name.to_string(),
            message: "document has no name".to_string(),
        });
    }
    let fields = value
        .get("fields")
        .and_then(Value::as_object)
        .map(decode_fields)
        .unwrap_or_default();
    Ok(Document { id, fields })
}

pub fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), decode_value(value)))
        .collect()
}

/// Typed Firestore value to plain JSON. Timestamps, references and bytes
/// become strings.
pub fn decode_value(value: &Value) -> Value {
    let Some(object) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = object.iter().next() else {
        return Value::Null;
    };
    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or(false)),
        "integerValue" => match inner {
            Value::String(text) => text
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .unwrap_or_else(|_| Value::String(text.clone())),
            Value::Number(n) => Value::Number(n.clone()),
            _ => Value::Null,
        },
        "doubleValue" => match inner {
            Value::Number(n) => Value::Number(n.clone()),
            Value::String(text) => text
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(text.clone())),
            _ => Value::Null,
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            Value::String(inner.as_str().unwrap_or_default().to_string())
        }
        "geoPointValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

pub fn encode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(flag) => json!({ "booleanValue": flag }),
        Value::Number(n) => match n.as_i64() {
            Some(int) => json!({ "integerValue": int.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or(0.0) }),
        },
        Value::String(text) => json!({ "stringValue": text }),
        Value::Array(values) => json!({
            "arrayValue": { "values": values.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_path_quoting() {
        assert_eq!(field_path("firstName"), "firstName");
        assert_eq!(field_path("_private2"), "_private2");
        assert_eq!(field_path("SF available"), "`SF available`");
        assert_eq!(field_path("price per sf"), "`price per sf`");
        assert_eq!(field_path("2fast"), "`2fast`");
    }

    #[test]
    fn test_decode_typed_values() {
        let typed = json!({
            "firstName": { "stringValue": "Jane" },
            "age": { "integerValue": "42" },
            "rate": { "doubleValue": 1.5 },
            "active": { "booleanValue": true },
            "createdAt": { "timestampValue": "2024-01-02T03:04:05Z" },
            "tags": { "arrayValue": { "values": [{ "stringValue": "a" }] } },
            "empty": { "arrayValue": {} },
            "meta": { "mapValue": { "fields": { "k": { "nullValue": null } } } }
        });
        let decoded = decode_fields(typed.as_object().unwrap());
        assert_eq!(
            Value::Object(decoded),
            json!({
                "firstName": "Jane",
                "age": 42,
                "rate": 1.5,
                "active": true,
                "createdAt": "2024-01-02T03:04:05Z",
                "tags": ["a"],
                "empty": [],
                "meta": { "k": null }
            })
        );
    }

    #[test]
    fn test_encode_plain_values() {
        assert_eq!(encode_value(&json!("x")), json!({ "stringValue": "x" }));
        assert_eq!(encode_value(&json!(7)), json!({ "integerValue": "7" }));
        assert_eq!(encode_value(&json!(7.25)), json!({ "doubleValue": 7.25 }));
        assert_eq!(
            encode_value(&json!(["a"])),
            json!({ "arrayValue": { "values": [{ "stringValue": "a" }] } })
        );
    }

    #[test]
    fn test_decode_document_takes_id_from_name() {
        let raw = json!({
            "name": "projects/p/databases/(default)/documents/contacts/abc123",
            "fields": { "email": { "stringValue": "a@b.c" } }
        });
        let doc = decode_document(&raw).unwrap();
        assert_eq!(doc.id, "abc123");
        assert_eq!(doc.fields["email"], json!("a@b.c"));
    }

    #[test]
    fn test_status_error_mapping() {
        let body = r#"{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}"#;
        let err = status_error(StatusCode::FORBIDDEN, body, "list contacts");
        assert!(matches!(err, StoreError::PermissionDenied(ref m) if m.contains("insufficient permissions")));

        let err = status_error(StatusCode::NOT_FOUND, "", "get contacts/x");
        assert!(matches!(err, StoreError::NotFound(_)));

        let err = status_error(StatusCode::INTERNAL_SERVER_ERROR, "oops", "list contacts");
        assert!(matches!(err, StoreError::Backend(ref m) if m.contains("500")));
    }

    #[test]
    fn test_structured_query_shape() {
        let query = Query::new()
            .where_eq("listingId", "l1")
            .where_eq("type", "tour")
            .order_by("timestamp");
        let structured = structured_query("activities", &query);
        assert_eq!(structured["from"][0]["collectionId"], json!("activities"));
        assert_eq!(
            structured["where"]["compositeFilter"]["filters"][1]["fieldFilter"]["value"],
            json!({ "stringValue": "tour" })
        );
        assert_eq!(structured["orderBy"][0]["field"]["fieldPath"], json!("timestamp"));
    }
}
