//! The contacts collection as the UI sees it: loaded in one go, named, sorted
//! and updated in place after the store acknowledges a write.

use thiserror::Error;

use crate::model::{compare_names, Contact, RecordPatch, CONTACTS};
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchCause {
    Configuration,
    Permission,
    NotFound,
    Network,
    Other,
}

/// A failed collection load, carrying the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    pub cause: FetchCause,
    pub message: String,
}

impl FetchError {
    /// Build the user-facing error for a failed load of `collection`.
    pub fn new(cause: FetchCause, collection: &str, detail: &str) -> Self {
        let message = match cause {
            FetchCause::Configuration => {
                "Store configuration is missing. Please update the [store] section of config.toml."
                    .to_string()
            }
            FetchCause::Permission => {
                "Access denied. Please check your document store security rules.".to_string()
            }
            FetchCause::NotFound => format!(
                "{} collection not found. Please create a \"{}\" collection in your document store.",
                capitalize(collection),
                collection
            ),
            FetchCause::Network => format!(
                "Network error: unable to reach the document store ({}).",
                detail
            ),
            FetchCause::Other => format!("Failed to load {}: {}", collection, detail),
        };
        Self { cause, message }
    }

    pub fn from_store(err: StoreError, collection: &str) -> Self {
        let cause = match &err {
            StoreError::NotConfigured(_) => FetchCause::Configuration,
            StoreError::PermissionDenied(_) => FetchCause::Permission,
            StoreError::NotFound(_) => FetchCause::NotFound,
            StoreError::Network(_) => FetchCause::Network,
            StoreError::Malformed { .. } | StoreError::Backend(_) => FetchCause::Other,
        };
        let detail = match &err {
            StoreError::Network(detail) | StoreError::Backend(detail) => detail.clone(),
            other => other.to_string(),
        };
        FetchError::new(cause, collection, &detail)
    }
}

impl From<StoreError> for FetchError {
    fn from(err: StoreError) -> Self {
        FetchError::from_store(err, CONTACTS)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Order contacts by display name.
pub fn sort_contacts(contacts: &mut [Contact]) {
    contacts.sort_by(|a, b| compare_names(&a.display_name, &b.display_name));
}

/// Load every contact, derive display names and sort. Documents that do not
/// decode are skipped with a warning rather than failing the whole load.
pub async fn fetch_contacts(store: &dyn DocumentStore) -> Result<Vec<Contact>, FetchError> {
    let docs = store.list(CONTACTS).await.map_err(|err| {
        tracing::error!(error = %err, store = %store.describe(), "failed to load contacts");
        FetchError::from(err)
    })?;

    let mut contacts = Vec::with_capacity(docs.len());
    for doc in docs {
        let id = doc.id.clone();
        match Contact::from_document(doc) {
            Ok(contact) => contacts.push(contact),
            Err(err) => tracing::warn!(id = %id, error = %err, "skipping malformed contact"),
        }
    }
    sort_contacts(&mut contacts);

    tracing::info!(count = contacts.len(), "contacts loaded");
    Ok(contacts)
}

/// Write a partial update for one contact. Derived keys are dropped; a patch
/// without an id, or with nothing left to write, is a no-op.
pub async fn save_contact(store: &dyn DocumentStore, patch: &RecordPatch) -> Result<Option<RecordPatch>, StoreError> {
    if patch.id.trim().is_empty() {
        tracing::warn!("ignoring contact save without an id");
        return Ok(None);
    }
    let patch = patch.clone().without_derived();
    if patch.is_empty() {
        return Ok(None);
    }
    store.update(CONTACTS, &patch.id, &patch.fields).await?;
    tracing::info!(id = %patch.id, fields = patch.fields.len(), "contact saved");
    Ok(Some(patch))
}

/// In-memory contact set, kept sorted by display name.
#[derive(Debug, Clone, Default)]
pub struct ContactDirectory {
    contacts: Vec<Contact>,
}

impl ContactDirectory {
    pub fn new(contacts: Vec<Contact>) -> Self {
        let mut directory = Self { contacts };
        sort_contacts(&mut directory.contacts);
        directory
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|contact| contact.id == id)
    }

    pub fn replace(&mut self, contacts: Vec<Contact>) {
        self.contacts = contacts;
        sort_contacts(&mut self.contacts);
    }

    /// Mirror an acknowledged write. Returns false when the id is unknown.
    pub fn merge(&mut self, patch: &RecordPatch) -> bool {
        let Some(contact) = self.contacts.iter_mut().find(|c| c.id == patch.id) else {
            return false;
        };
        contact.apply_fields(&patch.fields);
        if patch.touches_name() {
            sort_contacts(&mut self.contacts);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::local::LocalStore;
    use crate::store::UnconfiguredStore;
    use serde_json::{json, Map, Value};

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn seeded() -> LocalStore {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .put("contacts", "c1", obj(json!({"firstName": "Zed", "lastName": "Adams", "phone": "111"})))
            .unwrap();
        store
            .put("contacts", "c2", obj(json!({"firstName": "Ada", "displayName": "Wrong"})))
            .unwrap();
        store.put("contacts", "c3", obj(json!({"email": "x@y.z"}))).unwrap();
        store
    }

    #[tokio::test]
    async fn test_fetch_contacts_derives_and_sorts() {
        let store = seeded();
        let contacts = fetch_contacts(&store).await.unwrap();
        let names: Vec<&str> = contacts.iter().map(|c| c.display_name.as_str()).collect();
        assert_eq!(names, vec!["Ada", "Unnamed Contact", "Zed Adams"]);
    }

    #[tokio::test]
    async fn test_fetch_unconfigured_is_configuration_error() {
        let store = UnconfiguredStore::new("no project id");
        let err = fetch_contacts(&store).await.unwrap_err();
        assert_eq!(err.cause, FetchCause::Configuration);
        assert!(err.message.starts_with("Store configuration is missing"));
    }

    #[test]
    fn test_fetch_error_messages() {
        let err = FetchError::from(StoreError::Network("timed out".to_string()));
        assert_eq!(err.cause, FetchCause::Network);
        assert_eq!(
            err.to_string(),
            "Network error: unable to reach the document store (timed out)."
        );

        let err = FetchError::from(StoreError::PermissionDenied("403".to_string()));
        assert_eq!(err.cause, FetchCause::Permission);

        let err = FetchError::from(StoreError::Backend("boom".to_string()));
        assert_eq!(err.to_string(), "Failed to load contacts: boom");

        let err = FetchError::from(StoreError::NotFound("contacts".to_string()));
        assert_eq!(
            err.to_string(),
            "Contacts collection not found. Please create a \"contacts\" collection in your document store."
        );

        let err = FetchError::from_store(StoreError::NotFound("listings".to_string()), "listings");
        assert!(err.message.starts_with("Listings collection not found"));
    }

    #[tokio::test]
    async fn test_save_phone_round_trip() {
        let store = seeded();
        let mut directory = ContactDirectory::new(fetch_contacts(&store).await.unwrap());

        let mut patch = RecordPatch::new("c1");
        patch.set("phone", "5551234567");
        let written = save_contact(&store, &patch).await.unwrap().unwrap();
        assert!(directory.merge(&written));

        let contact = directory.get("c1").unwrap();
        assert_eq!(contact.phone.as_deref(), Some("5551234567"));
        assert_eq!(contact.display_name, "Zed Adams");

        let stored = store.get("contacts", "c1").await.unwrap().unwrap();
        assert_eq!(stored.fields["phone"], json!("5551234567"));
        assert_eq!(stored.fields["firstName"], json!("Zed"));
    }

    #[tokio::test]
    async fn test_save_strips_derived_and_resorts_on_rename() {
        let store = seeded();
        let mut directory = ContactDirectory::new(fetch_contacts(&store).await.unwrap());

        let mut patch = RecordPatch::new("c1");
        patch.set("firstName", "Aaron");
        patch.set("displayName", "ignored");
        let written = save_contact(&store, &patch).await.unwrap().unwrap();
        assert!(!written.fields.contains_key("displayName"));
        directory.merge(&written);

        assert_eq!(directory.contacts()[0].display_name, "Aaron Adams");
        let stored = store.get("contacts", "c1").await.unwrap().unwrap();
        assert!(!stored.fields.contains_key("displayName"));
    }

    #[tokio::test]
    async fn test_failed_save_leaves_memory_untouched() {
        let store = seeded();
        let directory = ContactDirectory::new(fetch_contacts(&store).await.unwrap());

        let mut patch = RecordPatch::new("c1");
        patch.set("phone", "999");
        let unconfigured = UnconfiguredStore::new("offline");
        assert!(save_contact(&unconfigured, &patch).await.is_err());
        assert_eq!(directory.get("c1").unwrap().phone.as_deref(), Some("111"));
        let stored = store.get("contacts", "c1").await.unwrap().unwrap();
        assert_eq!(stored.fields["phone"], json!("111"));
    }

    #[tokio::test]
    async fn test_save_without_id_is_noop() {
        let store = seeded();
        let mut patch = RecordPatch::new("");
        patch.set("phone", "1");
        assert_eq!(save_contact(&store, &patch).await.unwrap(), None);
    }
}
