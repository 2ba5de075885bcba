//! Recipient items
//!
//! A recipient is one item of a batch run. The ingestion boundary yields
//! ordered rows of string key/value pairs; [`Recipient::from_row`] lifts a
//! row into the typed form using fixed column names (no header guessing).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One parsed row from a tabular input file.
pub type Row = HashMap<String, String>;

/// One batch item: a destination mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Destination address
    pub address: String,
    /// Optional display name; defaults to the address local part at send time
    #[serde(default)]
    pub name: Option<String>,
}

impl Recipient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    /// Build from an ingested row. Expects an `email` column; an optional
    /// `name` column is honored. Returns `None` when the address is absent
    /// so the caller can account for the row as a terminal failure.
    pub fn from_row(row: &Row) -> Option<Self> {
        let address = row.get("email")?.trim();
        if address.is_empty() {
            return None;
        }

        Some(Self {
            address: address.to_string(),
            name: row
                .get("name")
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        })
    }

    /// Display name with the local-part fallback applied.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .address
                .split('@')
                .next()
                .unwrap_or(&self.address)
                .to_string(),
        }
    }
}
