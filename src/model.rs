//! Record types for the `contacts`, `listings`, `contactLists` and
//! `activities` collections.
//!
//! Records are decoded from the plain JSON object a [`DocumentStore`] hands
//! back; the document id travels separately and is attached afterwards.
//!
//! [`DocumentStore`]: crate::store::DocumentStore

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::store::Document;
use crate::translit;

pub const CONTACTS: &str = "contacts";
pub const LISTINGS: &str = "listings";
pub const CONTACT_LISTS: &str = "contactLists";
pub const ACTIVITIES: &str = "activities";

pub const UNNAMED_CONTACT: &str = "Unnamed Contact";
pub const UNTITLED_LISTING: &str = "Untitled Listing";

/// Display name rule: "first last" when both are present, whichever one is
/// present otherwise, the sentinel when neither is.
pub fn display_name(first: Option<&str>, last: Option<&str>) -> String {
    let first = first.filter(|value| !value.is_empty());
    let last = last.filter(|value| !value.is_empty());
    match (first, last) {
        (Some(first), Some(last)) => format!("{} {}", first, last),
        (Some(only), None) | (None, Some(only)) => only.to_string(),
        (None, None) => UNNAMED_CONTACT.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(skip)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub business_sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub notes: Option<String>,
    /// Derived, recomputed on load and after every edit.
    #[serde(skip)]
    pub display_name: String,
    /// Stored fields this crate does not model (e.g. `createdAt`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Contact {
    pub fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        let mut fields = doc.fields;
        // A stored `displayName`/`name` must never shadow the derived one.
        for derived in DERIVED_KEYS {
            fields.remove(*derived);
        }
        let mut contact: Contact = serde_json::from_value(Value::Object(fields))?;
        contact.id = doc.id;
        contact.refresh_display_name();
        Ok(contact)
    }

    pub fn refresh_display_name(&mut self) {
        self.display_name = display_name(self.first_name.as_deref(), self.last_name.as_deref());
    }

    pub fn created_at(&self) -> Option<&str> {
        self.extra.get("createdAt").and_then(Value::as_str)
    }

    /// Calendar date of `createdAt`, when it is an RFC 3339 timestamp.
    pub fn added_on(&self) -> Option<String> {
        let stamp = OffsetDateTime::parse(self.created_at()?, &Rfc3339).ok()?;
        stamp.format(format_description!("[year]-[month]-[day]")).ok()
    }

    /// Overwrite the named fields with the values from a patch. Unknown keys
    /// land in `extra`; derived keys are ignored.
    pub fn apply_fields(&mut self, fields: &Map<String, Value>) {
        for (key, value) in fields {
            let text = value_as_text(value);
            match key.as_str() {
                "firstName" => self.first_name = text,
                "lastName" => self.last_name = text,
                "email" => self.email = text,
                "phone" => self.phone = text,
                "company" => self.company = text,
                "businessSector" => self.business_sector = text,
                "address" => self.address = text,
                "linkedin" => self.linkedin = text,
                "notes" => self.notes = text,
                other if DERIVED_KEYS.contains(&other) => {}
                other => {
                    self.extra.insert(other.to_string(), value.clone());
                }
            }
        }
        self.refresh_display_name();
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        match key {
            "firstName" => self.first_name.as_deref(),
            "lastName" => self.last_name.as_deref(),
            "email" => self.email.as_deref(),
            "phone" => self.phone.as_deref(),
            "company" => self.company.as_deref(),
            "businessSector" => self.business_sector.as_deref(),
            "address" => self.address.as_deref(),
            "linkedin" => self.linkedin.as_deref(),
            "notes" => self.notes.as_deref(),
            _ => self.extra.get(key).and_then(Value::as_str),
        }
    }
}

/// Keys that are computed locally and must never be written back.
pub const DERIVED_KEYS: &[&str] = &["displayName", "name", "id"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "streetAddress", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub street_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub zip: Option<String>,
    #[serde(rename = "SF available", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub sf_available: Option<String>,
    #[serde(rename = "leaseorsale", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub lease_or_sale: Option<String>,
    #[serde(rename = "price per sf", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub price_per_sf: Option<String>,
    #[serde(rename = "contactListIds", default, skip_serializing_if = "Vec::is_empty")]
    pub contact_list_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Listing {
    pub fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        let mut listing: Listing = serde_json::from_value(Value::Object(doc.fields))?;
        listing.id = doc.id;
        Ok(listing)
    }

    pub fn title(&self) -> &str {
        self.street_address
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(UNTITLED_LISTING)
    }

    /// "City, ST 12345" with whatever parts are present.
    pub fn locality(&self) -> String {
        let city = self.city.as_deref().unwrap_or("").trim();
        let state = self.state.as_deref().unwrap_or("").trim();
        let zip = self.zip.as_deref().unwrap_or("").trim();
        let region = [state, zip]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        match (city.is_empty(), region.is_empty()) {
            (false, false) => format!("{}, {}", city, region),
            (false, true) => city.to_string(),
            (true, false) => region,
            (true, true) => String::new(),
        }
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        match key {
            "streetAddress" => self.street_address.as_deref(),
            "city" => self.city.as_deref(),
            "state" => self.state.as_deref(),
            "zip" => self.zip.as_deref(),
            "SF available" => self.sf_available.as_deref(),
            "leaseorsale" => self.lease_or_sale.as_deref(),
            "price per sf" => self.price_per_sf.as_deref(),
            _ => self.extra.get(key).and_then(Value::as_str),
        }
    }

    pub fn apply_fields(&mut self, fields: &Map<String, Value>) {
        for (key, value) in fields {
            let text = value_as_text(value);
            match key.as_str() {
                "streetAddress" => self.street_address = text,
                "city" => self.city = text,
                "state" => self.state = text,
                "zip" => self.zip = text,
                "SF available" => self.sf_available = text,
                "leaseorsale" => self.lease_or_sale = text,
                "price per sf" => self.price_per_sf = text,
                "contactListIds" => {
                    self.contact_list_ids = value
                        .as_array()
                        .map(|ids| ids.iter().filter_map(|id| id.as_str().map(str::to_string)).collect())
                        .unwrap_or_default();
                }
                "id" => {}
                other => {
                    self.extra.insert(other.to_string(), value.clone());
                }
            }
        }
    }
}

/// A list as it is written; `createdAt` is stamped by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContactList {
    pub name: String,
    pub contact_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactList {
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contact_ids: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ContactList {
    pub fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        let mut list: ContactList = serde_json::from_value(Value::Object(doc.fields))?;
        list.id = doc.id;
        Ok(list)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(skip)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub listing_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub contact_id: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: Option<String>,
}

impl Activity {
    pub fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        let mut activity: Activity = serde_json::from_value(Value::Object(doc.fields))?;
        activity.id = doc.id;
        Ok(activity)
    }
}

/// A partial update against one record. Only the keys in `fields` are
/// written; everything else on the stored record is left alone.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPatch {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl RecordPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), Value::String(value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn without_derived(mut self) -> Self {
        for key in DERIVED_KEYS {
            self.fields.remove(*key);
        }
        self
    }

    pub fn touches_name(&self) -> bool {
        self.fields.contains_key("firstName") || self.fields.contains_key("lastName")
    }
}

/// Locale-aware ordering used for display names and listing titles.
pub fn compare_names(a: &str, b: &str) -> std::cmp::Ordering {
    translit::collation_key(a)
        .cmp(&translit::collation_key(b))
        .then_with(|| a.cmp(b))
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        other => Some(other.to_string()),
    }
}

/// Accept strings, numbers and booleans; the store is schemaless and older
/// records hold `SF available` and friends as numbers.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_text))
}
