//! List mode: pick contacts, name the selection, persist it as a ContactList.

use serde_json::Value;
use thiserror::Error;

use crate::model::{NewContactList, CONTACT_LISTS};
use crate::store::{DocumentStore, NewDocument, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    Browsing,
    Selecting,
    Naming,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListBuilderError {
    #[error("No contacts selected.")]
    EmptySelection,
    #[error("Please enter a list name.")]
    EmptyName,
    #[error("not naming a list")]
    NotNaming,
}

#[derive(Debug, Clone)]
pub struct ListBuilder {
    mode: ListMode,
    /// Selected contact ids in the order they were picked.
    selected: Vec<String>,
    name: String,
}

impl Default for ListBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ListBuilder {
    pub fn new() -> Self {
        Self {
            mode: ListMode::Browsing,
            selected: Vec::new(),
            name: String::new(),
        }
    }

    pub fn mode(&self) -> ListMode {
        self.mode
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|selected| selected == id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn start_selecting(&mut self) {
        if self.mode == ListMode::Browsing {
            self.mode = ListMode::Selecting;
            self.selected.clear();
            self.name.clear();
        }
    }

    /// Add or remove `id`. Ignored outside of selecting.
    pub fn toggle(&mut self, id: &str) {
        if self.mode != ListMode::Selecting {
            return;
        }
        if let Some(pos) = self.selected.iter().position(|selected| selected == id) {
            self.selected.remove(pos);
        } else {
            self.selected.push(id.to_string());
        }
    }

    pub fn begin_naming(&mut self) -> Result<(), ListBuilderError> {
        if self.mode != ListMode::Selecting {
            return Ok(());
        }
        if self.selected.is_empty() {
            return Err(ListBuilderError::EmptySelection);
        }
        self.mode = ListMode::Naming;
        Ok(())
    }

    /// Drop the selection without writing anything.
    pub fn cancel(&mut self) {
        self.mode = ListMode::Browsing;
        self.selected.clear();
        self.name.clear();
    }

    /// The list that would be written now.
    pub fn prepare_save(&self) -> Result<NewContactList, ListBuilderError> {
        if self.mode != ListMode::Naming {
            return Err(ListBuilderError::NotNaming);
        }
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ListBuilderError::EmptyName);
        }
        if self.selected.is_empty() {
            return Err(ListBuilderError::EmptySelection);
        }
        Ok(NewContactList {
            name: name.to_string(),
            contact_ids: self.selected.clone(),
        })
    }

    /// The write went through: back to browsing with nothing selected.
    pub fn complete_save(&mut self) {
        self.cancel();
    }
}

/// Persist a list with a store-assigned `createdAt`. Returns the new id.
pub async fn create_contact_list(store: &dyn DocumentStore, list: &NewContactList) -> Result<String, StoreError> {
    let fields = match serde_json::to_value(list) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return Err(StoreError::Backend("contact list did not serialize to an object".to_string())),
        Err(err) => return Err(StoreError::Backend(err.to_string())),
    };
    let id = store
        .add(
            CONTACT_LISTS,
            NewDocument {
                fields,
                server_timestamps: vec!["createdAt".to_string()],
            },
        )
        .await?;
    tracing::info!(id = %id, name = %list.name, contacts = list.contact_ids.len(), "contact list created");
    Ok(id)
}
