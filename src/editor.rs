//! View/edit state for one contact or listing.
//!
//! The editor works on a draft copy of the editable fields. Nothing reaches
//! the record until the caller turns [`DetailEditor::changes`] into a save.

use crate::filter::SECTOR_OPTIONS;
use crate::listings::LEASE_OR_SALE_OPTIONS;
use crate::model::{Contact, Listing, RecordPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Multiline,
    /// One of a fixed set of values, or empty.
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn field(key: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { key, label, kind }
}

pub const CONTACT_FIELDS: &[FieldSpec] = &[
    field("firstName", "First name", FieldKind::Text),
    field("lastName", "Last name", FieldKind::Text),
    field("email", "Email", FieldKind::Text),
    field("phone", "Phone", FieldKind::Text),
    field("company", "Company", FieldKind::Text),
    field("businessSector", "Business sector", FieldKind::Choice(SECTOR_OPTIONS)),
    field("address", "Address", FieldKind::Text),
    field("linkedin", "LinkedIn", FieldKind::Text),
    field("notes", "Notes", FieldKind::Multiline),
];

pub const LISTING_FIELDS: &[FieldSpec] = &[
    field("streetAddress", "Street address", FieldKind::Text),
    field("city", "City", FieldKind::Text),
    field("state", "State", FieldKind::Text),
    field("zip", "ZIP", FieldKind::Text),
    field("SF available", "SF available", FieldKind::Text),
    field("leaseorsale", "Lease or sale", FieldKind::Choice(LEASE_OR_SALE_OPTIONS)),
    field("price per sf", "Price per SF", FieldKind::Text),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Contact,
    Listing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    View,
    Edit,
}

#[derive(Debug, Clone)]
pub struct DetailEditor {
    kind: RecordKind,
    id: String,
    title: String,
    specs: &'static [FieldSpec],
    original: Vec<String>,
    draft: Vec<String>,
    mode: EditorMode,
    selected: usize,
}

impl DetailEditor {
    fn new(
        kind: RecordKind,
        id: &str,
        title: String,
        specs: &'static [FieldSpec],
        lookup: impl Fn(&str) -> Option<String>,
        mode: EditorMode,
    ) -> Self {
        let original: Vec<String> = specs
            .iter()
            .map(|spec| lookup(spec.key).unwrap_or_default())
            .collect();
        Self {
            kind,
            id: id.to_string(),
            title,
            specs,
            draft: original.clone(),
            original,
            mode,
            selected: 0,
        }
    }

    pub fn for_contact(contact: &Contact, mode: EditorMode) -> Self {
        Self::new(
            RecordKind::Contact,
            &contact.id,
            contact.display_name.clone(),
            CONTACT_FIELDS,
            |key| contact.field(key).map(str::to_string),
            mode,
        )
    }

    pub fn for_listing(listing: &Listing, mode: EditorMode) -> Self {
        Self::new(
            RecordKind::Listing,
            &listing.id,
            listing.title().to_string(),
            LISTING_FIELDS,
            |key| listing.field(key).map(str::to_string),
            mode,
        )
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn begin_edit(&mut self) {
        self.mode = EditorMode::Edit;
    }

    pub fn specs(&self) -> &'static [FieldSpec] {
        self.specs
    }

    /// Field specs paired with their current draft values.
    pub fn fields(&self) -> impl Iterator<Item = (&FieldSpec, &str)> {
        self.specs
            .iter()
            .zip(self.draft.iter().map(String::as_str))
    }

    pub fn value(&self, index: usize) -> &str {
        self.draft.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_spec(&self) -> Option<&FieldSpec> {
        self.specs.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if !self.specs.is_empty() {
            self.selected = (self.selected + 1) % self.specs.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.specs.is_empty() {
            self.selected = (self.selected + self.specs.len() - 1) % self.specs.len();
        }
    }

    /// Replace the draft value of the selected field. Only in edit mode.
    pub fn set_selected_value(&mut self, value: impl Into<String>) {
        if self.mode != EditorMode::Edit {
            return;
        }
        if let Some(slot) = self.draft.get_mut(self.selected) {
            *slot = value.into();
        }
    }

    /// Step a choice field through empty and each option.
    pub fn cycle_choice(&mut self, forward: bool) {
        if self.mode != EditorMode::Edit {
            return;
        }
        let Some(FieldKind::Choice(options)) = self.selected_spec().map(|spec| spec.kind) else {
            return;
        };
        let Some(current) = self.draft.get(self.selected) else {
            return;
        };

        // Position 0 is "unset"; options follow.
        let len = options.len() + 1;
        let pos = options
            .iter()
            .position(|option| option.eq_ignore_ascii_case(current.trim()))
            .map(|i| i + 1)
            .unwrap_or(0);
        let next = if forward { (pos + 1) % len } else { (pos + len - 1) % len };
        let value = if next == 0 { String::new() } else { options[next - 1].to_string() };
        self.set_selected_value(value);
    }

    pub fn is_dirty(&self) -> bool {
        self.original != self.draft
    }

    /// Patch of fields whose draft differs from the loaded record. A missing
    /// field and an empty one compare equal.
    pub fn changes(&self) -> RecordPatch {
        let mut patch = RecordPatch::new(self.id.clone());
        for ((spec, original), draft) in self.specs.iter().zip(&self.original).zip(&self.draft) {
            if original != draft {
                patch.set(spec.key, draft.clone());
            }
        }
        patch
    }
}
