//! Contact store: three slots, JSON-persisted, snapshot on demand

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

use crate::error::StoreError;
use crate::types::{Contact, ContactList};
use crate::MAX_CONTACTS;

lazy_static! {
    // + digits spaces dashes parens, 3..=20 chars
    static ref RE_PHONE: Regex = Regex::new(r"^\+?[0-9 ()\-]{3,20}$").unwrap();
}

/// Is this something a text message can be sent to?
pub fn is_valid_phone(number: &str) -> bool {
    let number = number.trim();
    RE_PHONE.is_match(number) && number.chars().any(|c| c.is_ascii_digit())
}

/// Source of the contact snapshot taken at alert time
pub trait ContactStore: Send + Sync {
    fn snapshot(&self) -> ContactList;
}

/// In-memory contact slots, optionally backed by a JSON file
#[derive(Debug, Default)]
pub struct ContactBook {
    list: RwLock<ContactList>,
    path: Option<PathBuf>,
}

impl ContactBook {
    /// Create empty, unpersisted book
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file (an array of up to 3 `{name, phone_number}` or
    /// nulls). A missing file yields an empty book that saves to `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let list = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            let slots: Vec<Option<Contact>> = serde_json::from_str(&text)?;
            let mut list = ContactList::new();
            for (i, contact) in slots.into_iter().take(MAX_CONTACTS).enumerate() {
                if let Some(c) = &contact {
                    if !is_valid_phone(&c.phone_number) {
                        return Err(StoreError::InvalidPhone(c.phone_number.clone()));
                    }
                }
                list.set(i, contact);
            }
            list
        } else {
            ContactList::new()
        };
        info!(path = %path.display(), contacts = list.len(), "contacts loaded");
        Ok(Self { list: RwLock::new(list), path: Some(path) })
    }

    /// Set slot `slot` (1-based, as the user sees it)
    pub fn set_slot(&self, slot: usize, contact: Contact) -> Result<(), StoreError> {
        if !is_valid_phone(&contact.phone_number) {
            return Err(StoreError::InvalidPhone(contact.phone_number));
        }
        self.write_slot(slot, Some(contact))
    }

    /// Clear slot `slot` (1-based)
    pub fn clear_slot(&self, slot: usize) -> Result<(), StoreError> {
        self.write_slot(slot, None)
    }

    fn write_slot(&self, slot: usize, contact: Option<Contact>) -> Result<(), StoreError> {
        if slot == 0 || slot > MAX_CONTACTS {
            return Err(StoreError::NoSuchSlot(slot));
        }
        let mut list = self.list.write().unwrap_or_else(|p| p.into_inner());
        let mut next = list.clone();
        next.set(slot - 1, contact);
        self.persist(&next)?;
        *list = next;
        Ok(())
    }

    fn persist(&self, list: &ContactList) -> Result<(), StoreError> {
        if let Some(path) = &self.path {
            let json = serde_json::to_string_pretty(list.slots())?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }
}

impl ContactStore for ContactBook {
    fn snapshot(&self) -> ContactList {
        self.list.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl ContactStore for ContactList {
    fn snapshot(&self) -> ContactList {
        self.clone()
    }
}
