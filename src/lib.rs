//! Terminal CRM for a commercial real-estate brokerage: contacts, listings,
//! contact lists and an assistant chat backed by a document store.

pub mod config;
pub mod directory;
pub mod editor;
pub mod filter;
pub mod listings;
pub mod lists;
pub mod logging;
pub mod model;
pub mod phone;
pub mod remote;
pub mod search;
pub mod store;
pub mod translit;
pub mod ui;
