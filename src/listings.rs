//! Property listings plus the tour activities recorded against them.

use crate::directory::FetchError;
use crate::model::{compare_names, Activity, Contact, Listing, RecordPatch, ACTIVITIES, CONTACTS, LISTINGS};
use crate::store::{DocumentStore, Query, StoreError};

pub const LEASE_OR_SALE_OPTIONS: &[&str] = &["lease", "sale"];
pub const TOUR: &str = "tour";

pub fn sort_listings(listings: &mut [Listing]) {
    listings.sort_by(|a, b| compare_names(a.title(), b.title()));
}

pub async fn fetch_listings(store: &dyn DocumentStore) -> Result<Vec<Listing>, FetchError> {
    let docs = store.list(LISTINGS).await.map_err(|err| {
        tracing::error!(error = %err, store = %store.describe(), "failed to load listings");
        FetchError::from_store(err, LISTINGS)
    })?;

    let mut listings = Vec::with_capacity(docs.len());
    for doc in docs {
        let id = doc.id.clone();
        match Listing::from_document(doc) {
            Ok(listing) => listings.push(listing),
            Err(err) => tracing::warn!(id = %id, error = %err, "skipping malformed listing"),
        }
    }
    sort_listings(&mut listings);

    tracing::info!(count = listings.len(), "listings loaded");
    Ok(listings)
}

/// Tour activities of one listing, oldest first.
pub async fn fetch_tours(store: &dyn DocumentStore, listing_id: &str) -> Result<Vec<Activity>, StoreError> {
    let query = Query::new()
        .where_eq("listingId", listing_id)
        .where_eq("type", TOUR)
        .order_by("timestamp");
    let docs = store.query(ACTIVITIES, &query).await?;

    let mut tours = Vec::with_capacity(docs.len());
    for doc in docs {
        let id = doc.id.clone();
        match Activity::from_document(doc) {
            Ok(activity) => tours.push(activity),
            Err(err) => tracing::warn!(id = %id, error = %err, "skipping malformed activity"),
        }
    }
    Ok(tours)
}

/// Look up the contact an activity points at. `Ok(None)` when the activity has
/// no contact or the contact no longer exists.
pub async fn resolve_contact(store: &dyn DocumentStore, activity: &Activity) -> Result<Option<Contact>, StoreError> {
    let Some(contact_id) = activity.contact_id.as_deref().filter(|id| !id.is_empty()) else {
        return Ok(None);
    };
    let Some(doc) = store.get(CONTACTS, contact_id).await? else {
        return Ok(None);
    };
    Contact::from_document(doc)
        .map(Some)
        .map_err(|err| StoreError::Malformed {
            id: contact_id.to_string(),
            message: err.to_string(),
        })
}

pub async fn save_listing(store: &dyn DocumentStore, patch: &RecordPatch) -> Result<Option<RecordPatch>, StoreError> {
    if patch.id.trim().is_empty() {
        tracing::warn!("ignoring listing save without an id");
        return Ok(None);
    }
    let mut patch = patch.clone();
    patch.fields.remove("id");
    if patch.is_empty() {
        return Ok(None);
    }
    store.update(LISTINGS, &patch.id, &patch.fields).await?;
    tracing::info!(id = %patch.id, fields = patch.fields.len(), "listing saved");
    Ok(Some(patch))
}

/// In-memory listing set, kept sorted by title.
#[derive(Debug, Clone, Default)]
pub struct ListingBook {
    listings: Vec<Listing>,
}

impl ListingBook {
    pub fn new(listings: Vec<Listing>) -> Self {
        let mut book = Self { listings };
        sort_listings(&mut book.listings);
        book
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Listing> {
        self.listings.iter().find(|listing| listing.id == id)
    }

    pub fn replace(&mut self, listings: Vec<Listing>) {
        self.listings = listings;
        sort_listings(&mut self.listings);
    }

    pub fn merge(&mut self, patch: &RecordPatch) -> bool {
        let Some(listing) = self.listings.iter_mut().find(|l| l.id == patch.id) else {
            return false;
        };
        listing.apply_fields(&patch.fields);
        if patch.fields.contains_key("streetAddress") {
            sort_listings(&mut self.listings);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::local::LocalStore;
    use serde_json::{json, Map, Value};

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn seeded() -> LocalStore {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .put("listings", "l1", obj(json!({"streetAddress": "9 Oak Ave", "city": "Austin"})))
            .unwrap();
        store.put("listings", "l2", obj(json!({"city": "Dallas"}))).unwrap();
        store
            .put("listings", "l3", obj(json!({"streetAddress": "1 Elm St", "SF available": 5000})))
            .unwrap();
        store
            .put("contacts", "c1", obj(json!({"firstName": "Tina", "lastName": "Tour"})))
            .unwrap();
        store
            .put("activities", "a1", obj(json!({"listingId": "l1", "contactId": "c1", "type": "tour", "timestamp": "2024-06-02T09:00:00Z"})))
            .unwrap();
        store
            .put("activities", "a2", obj(json!({"listingId": "l1", "contactId": "gone", "type": "tour", "timestamp": "2024-06-01T09:00:00Z"})))
            .unwrap();
        store
            .put("activities", "a3", obj(json!({"listingId": "l1", "type": "call", "timestamp": "2024-06-03T09:00:00Z"})))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_fetch_listings_sorted_by_title() {
        let store = seeded();
        let listings = fetch_listings(&store).await.unwrap();
        let titles: Vec<&str> = listings.iter().map(|l| l.title()).collect();
        assert_eq!(titles, vec!["1 Elm St", "9 Oak Ave", "Untitled Listing"]);
    }

    #[tokio::test]
    async fn test_fetch_tours_filters_and_orders() {
        let store = seeded();
        let tours = fetch_tours(&store, "l1").await.unwrap();
        let ids: Vec<&str> = tours.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a2", "a1"]);
    }

    #[tokio::test]
    async fn test_resolve_contact() {
        let store = seeded();
        let tours = fetch_tours(&store, "l1").await.unwrap();

        let missing = resolve_contact(&store, &tours[0]).await.unwrap();
        assert!(missing.is_none());

        let found = resolve_contact(&store, &tours[1]).await.unwrap().unwrap();
        assert_eq!(found.display_name, "Tina Tour");
    }

    #[tokio::test]
    async fn test_save_listing_merges() {
        let store = seeded();
        let mut book = ListingBook::new(fetch_listings(&store).await.unwrap());

        let mut patch = RecordPatch::new("l2");
        patch.set("streetAddress", "0 First St");
        patch.set("leaseorsale", "sale");
        let written = save_listing(&store, &patch).await.unwrap().unwrap();
        assert!(book.merge(&written));

        assert_eq!(book.listings()[0].id, "l2");
        assert_eq!(book.get("l2").unwrap().lease_or_sale.as_deref(), Some("sale"));
        let stored = store.get("listings", "l2").await.unwrap().unwrap();
        assert_eq!(stored.fields["city"], json!("Dallas"));
        assert_eq!(stored.fields["leaseorsale"], json!("sale"));
    }
}
